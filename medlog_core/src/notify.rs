//! Notification delivery boundary.
//!
//! The scheduler asks a [`Notifier`] whether delivery is possible before
//! arming and again at fire time. Implementations must not panic; failures
//! come back as errors that the scheduler logs and moves past.

use crate::Result;
use std::io::Write;

/// A notification capability
pub trait Notifier {
    /// Whether the platform can deliver notifications at all
    fn is_available(&self) -> bool;

    /// Whether the user has allowed notifications
    fn permission_granted(&self) -> bool;

    /// Show a notification. `tag` identifies the reminder so a platform can
    /// replace an earlier notification for the same reminder.
    fn show(&self, title: &str, body: &str, tag: &str) -> Result<()>;
}

/// Prints reminders to stdout
#[derive(Clone, Debug)]
pub struct ConsoleNotifier {
    enabled: bool,
}

impl ConsoleNotifier {
    /// `enabled = false` behaves as withheld permission
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

impl Notifier for ConsoleNotifier {
    fn is_available(&self) -> bool {
        true
    }

    fn permission_granted(&self) -> bool {
        self.enabled
    }

    fn show(&self, title: &str, body: &str, tag: &str) -> Result<()> {
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "🔔 {}: {}", title, body)?;
        stdout.flush()?;
        tracing::info!(tag, "Delivered reminder notification");
        Ok(())
    }
}
