#![forbid(unsafe_code)]

//! Core domain model and business logic for the medlog medication journal.
//!
//! This crate provides:
//! - Domain types (medication entries, reminders, persisted state)
//! - Persistence (key-value records with corruption tolerance)
//! - The medication log with import merge
//! - Daily reminder scheduling
//! - Backup and tabular export codecs

pub mod types;
pub mod error;
pub mod config;
pub mod logging;
pub mod store;
pub mod medication_log;
pub mod clock;
pub mod notify;
pub mod scheduler;
pub mod backup;
pub mod tracker;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use config::Config;
pub use store::{FileStorage, MemoryStorage, Storage, Store};
pub use medication_log::{MedicationLog, MergeOutcome, Removal};
pub use clock::{Clock, SystemClock};
pub use notify::{ConsoleNotifier, Notifier};
pub use scheduler::{compute_next_fire, NextFire, ReminderScheduler};
pub use tracker::{Added, Tracker, Upcoming};
