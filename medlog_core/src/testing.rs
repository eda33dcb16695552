//! Shared fixtures for unit tests.

use crate::{Clock, Error, Notifier, Result, Storage};
use chrono::{DateTime, TimeZone, Utc};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

/// Clock pinned to a start instant and advanced by tokio's (paused) time.
/// A lag makes the wall clock read behind the timer, like a wake that
/// arrives slightly early.
pub struct TestClock {
    base: DateTime<Utc>,
    started: tokio::time::Instant,
    lag: Cell<Duration>,
}

impl TestClock {
    pub fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> Self {
        Self {
            base: Utc
                .with_ymd_and_hms(year, month, day, hour, minute, 0)
                .single()
                .expect("valid test instant"),
            started: tokio::time::Instant::now(),
            lag: Cell::new(Duration::ZERO),
        }
    }

    pub fn set_lag(&self, lag: Duration) {
        self.lag.set(lag);
    }
}

impl Clock for TestClock {
    type Tz = Utc;

    fn now(&self) -> DateTime<Utc> {
        let elapsed = chrono::Duration::from_std(self.started.elapsed())
            .expect("elapsed fits in chrono duration");
        let lag = chrono::Duration::from_std(self.lag.get()).expect("lag fits in chrono duration");
        self.base + elapsed - lag
    }
}

/// Notifier that records every notification and can have permission revoked
pub struct RecordingNotifier {
    pub available: Cell<bool>,
    pub granted: Cell<bool>,
    pub fail: Cell<bool>,
    pub shown: RefCell<Vec<(String, String, String)>>,
}

impl RecordingNotifier {
    pub fn granted() -> Rc<Self> {
        Rc::new(Self {
            available: Cell::new(true),
            granted: Cell::new(true),
            fail: Cell::new(false),
            shown: RefCell::new(Vec::new()),
        })
    }

    pub fn denied() -> Rc<Self> {
        let notifier = Self::granted();
        notifier.granted.set(false);
        notifier
    }

    pub fn count(&self) -> usize {
        self.shown.borrow().len()
    }
}

impl Notifier for RecordingNotifier {
    fn is_available(&self) -> bool {
        self.available.get()
    }

    fn permission_granted(&self) -> bool {
        self.granted.get()
    }

    fn show(&self, title: &str, body: &str, tag: &str) -> Result<()> {
        if self.fail.get() {
            return Err(Error::Other("notification backend crashed".into()));
        }
        self.shown
            .borrow_mut()
            .push((title.to_string(), body.to_string(), tag.to_string()));
        Ok(())
    }
}

/// Storage whose writes always fail, like an exhausted quota
#[derive(Default)]
pub struct FullStorage;

impl Storage for FullStorage {
    fn read(&self, _key: &str) -> Result<Option<String>> {
        Ok(None)
    }

    fn write(&mut self, _key: &str, _value: &str) -> Result<()> {
        Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            "quota exceeded",
        )))
    }
}
