//! Core domain types for the medlog system.
//!
//! This module defines the fundamental types used throughout the system:
//! - Medication entries (one logged intake each)
//! - Daily reminders anchored to a time of day
//! - The persisted/interchange state
//! - Change events published to UI adapters

use crate::{Error, Result};
use chrono::{DateTime, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Time of day
// ============================================================================

/// Wall-clock hour:minute with no date component.
///
/// Serialized as `"HH:MM"`. Seconds are always zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay(NaiveTime);

impl TimeOfDay {
    /// Build from a 24-hour hour and minute; `None` when out of range
    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(Self)
    }

    pub fn hour(&self) -> u32 {
        self.0.hour()
    }

    pub fn minute(&self) -> u32 {
        self.0.minute()
    }

    pub fn as_naive(&self) -> NaiveTime {
        self.0
    }
}

impl FromStr for TimeOfDay {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        NaiveTime::parse_from_str(trimmed, "%H:%M")
            .map(Self)
            .map_err(|_| {
                Error::Validation(format!(
                    "invalid reminder time '{}': expected HH:MM (00:00-23:59)",
                    trimmed
                ))
            })
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<TimeOfDay> for String {
    fn from(value: TimeOfDay) -> Self {
        value.to_string()
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%H:%M"))
    }
}

// ============================================================================
// Medication entries and reminders
// ============================================================================

/// One logged medication intake. Never mutated after creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicationEntry {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub dosage: String,
    #[serde(default)]
    pub frequency: String,
    #[serde(default)]
    pub notes: String,
    pub logged_at: DateTime<Utc>,
}

impl MedicationEntry {
    /// Case-insensitive substring match over the text fields.
    ///
    /// `needle` must already be lowercased.
    pub fn matches(&self, needle: &str) -> bool {
        [&self.name, &self.dosage, &self.frequency, &self.notes]
            .iter()
            .any(|field| field.to_lowercase().contains(needle))
    }
}

/// A daily recurring reminder tied to one medication entry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    pub id: Uuid,
    pub medication_id: Uuid,
    pub time_of_day: TimeOfDay,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl Reminder {
    /// Create an active reminder with a fresh id
    pub fn new(medication_id: Uuid, time_of_day: TimeOfDay) -> Self {
        Self {
            id: Uuid::now_v7(),
            medication_id,
            time_of_day,
            active: true,
        }
    }
}

/// Form input for a new entry, as supplied by a UI adapter
#[derive(Clone, Debug, Default)]
pub struct NewEntry {
    pub name: String,
    pub dosage: String,
    pub frequency: String,
    pub notes: String,
    /// Optional `HH:MM` reminder time; blank means no reminder
    pub remind_at: Option<String>,
}

impl NewEntry {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Validate the input and build the entry it describes.
    ///
    /// Nothing is built when validation fails.
    pub fn build(self, logged_at: DateTime<Utc>) -> Result<(MedicationEntry, Option<TimeOfDay>)> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(Error::Validation("medication name is required".into()));
        }

        let remind_at = match self.remind_at.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => Some(raw.parse::<TimeOfDay>()?),
            _ => None,
        };

        let entry = MedicationEntry {
            id: Uuid::now_v7(),
            name: name.to_string(),
            dosage: self.dosage.trim().to_string(),
            frequency: self.frequency.trim().to_string(),
            notes: self.notes.trim().to_string(),
            logged_at,
        };

        Ok((entry, remind_at))
    }
}

// ============================================================================
// State
// ============================================================================

/// Full application state: the durable records and the backup payload
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedState {
    pub medications: Vec<MedicationEntry>,
    #[serde(default)]
    pub reminders: Vec<Reminder>,
    #[serde(default)]
    pub exported_at: Option<DateTime<Utc>>,
}

/// Change notifications for UI adapters
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StateChange {
    EntryAdded(Uuid),
    EntryRemoved(Uuid),
    ReminderToggled { id: Uuid, active: bool },
    Imported { entries: usize, reminders: usize },
    /// A reminder reached its fire time; `notified` is false when delivery
    /// was unavailable or not permitted.
    ReminderFired { reminder_id: Uuid, notified: bool },
    /// A flush failed; the in-memory state is still authoritative
    PersistenceFailed(String),
}
