//! Wall-clock capability used by the scheduler and the tracker.

use chrono::{DateTime, Local, TimeZone};

/// Source of the current time in a specific zone
pub trait Clock {
    type Tz: TimeZone;

    fn now(&self) -> DateTime<Self::Tz>;
}

/// The system clock in the local time zone
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    type Tz = Local;

    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}
