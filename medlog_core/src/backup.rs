//! Backup payload codec and tabular export.
//!
//! A backup is a versioned JSON document carrying every entry and reminder
//! plus the export timestamp. Decoding validates the document shape before
//! anything is deserialized, so a malformed payload never reaches the log.
//! The tabular export is one-way CSV with every field quoted.

use crate::{Error, MedicationEntry, PersistedState, Reminder, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Backup format version written by [`encode`]
pub const FORMAT_VERSION: u64 = 1;

const TABULAR_HEADER: [&str; 6] = ["id", "name", "dosage", "frequency", "notes", "logged_at"];

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BackupOut<'a> {
    version: u64,
    exported_at: Option<DateTime<Utc>>,
    medications: &'a [MedicationEntry],
    reminders: &'a [Reminder],
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BackupIn {
    #[serde(default)]
    exported_at: Option<DateTime<Utc>>,
    medications: Vec<MedicationEntry>,
    #[serde(default)]
    reminders: Vec<Reminder>,
}

/// Serialize the full state. Output is stable for a given state.
pub fn encode(state: &PersistedState) -> Result<String> {
    let doc = BackupOut {
        version: FORMAT_VERSION,
        exported_at: state.exported_at,
        medications: &state.medications,
        reminders: &state.reminders,
    };
    Ok(serde_json::to_string_pretty(&doc)?)
}

/// Parse a backup payload.
///
/// Any shape other than an object with a `medications` list is a
/// [`Error::Format`].
pub fn decode(payload: &str) -> Result<PersistedState> {
    let value: Value = serde_json::from_str(payload)
        .map_err(|e| Error::Format(format!("backup is not valid JSON: {}", e)))?;

    check_shape(&value)?;

    let doc: BackupIn = serde_json::from_value(value)
        .map_err(|e| Error::Format(format!("malformed backup: {}", e)))?;

    if let Some(blank) = doc.medications.iter().find(|m| m.name.trim().is_empty()) {
        return Err(Error::Format(format!(
            "medication {} has an empty name",
            blank.id
        )));
    }

    Ok(PersistedState {
        medications: doc.medications,
        reminders: doc.reminders,
        exported_at: doc.exported_at,
    })
}

fn check_shape(value: &Value) -> Result<()> {
    let object = value
        .as_object()
        .ok_or_else(|| Error::Format("backup must be a JSON object".into()))?;

    match object.get("medications") {
        Some(Value::Array(_)) => {}
        Some(_) => return Err(Error::Format("`medications` must be a list".into())),
        None => return Err(Error::Format("backup has no `medications` list".into())),
    }

    if let Some(reminders) = object.get("reminders") {
        if !reminders.is_array() {
            return Err(Error::Format("`reminders` must be a list".into()));
        }
    }

    if let Some(version) = object.get("version") {
        let version = version
            .as_u64()
            .ok_or_else(|| Error::Format("`version` must be a positive integer".into()))?;
        if version > FORMAT_VERSION {
            return Err(Error::Format(format!(
                "backup version {} is newer than supported version {}",
                version, FORMAT_VERSION
            )));
        }
    }

    Ok(())
}

/// A row in the tabular export
#[derive(Debug, Serialize)]
struct TabularRow<'a> {
    id: String,
    name: &'a str,
    dosage: &'a str,
    frequency: &'a str,
    notes: &'a str,
    logged_at: String,
}

impl<'a> From<&'a MedicationEntry> for TabularRow<'a> {
    fn from(entry: &'a MedicationEntry) -> Self {
        TabularRow {
            id: entry.id.to_string(),
            name: &entry.name,
            dosage: &entry.dosage,
            frequency: &entry.frequency,
            notes: &entry.notes,
            logged_at: entry.logged_at.to_rfc3339(),
        }
    }
}

/// Flatten entries into CSV: a header row, then one fully quoted row per
/// entry. Empty fields stay as `""` so every row has the same column count.
pub fn encode_tabular(entries: &[MedicationEntry]) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .quote_style(csv::QuoteStyle::Always)
        .from_writer(Vec::new());

    writer.write_record(TABULAR_HEADER)?;
    for entry in entries {
        writer.serialize(TabularRow::from(entry))?;
    }
    writer.flush()?;

    let bytes = writer.into_inner().map_err(|e| Error::Io(e.into_error()))?;
    String::from_utf8(bytes).map_err(|e| Error::Other(format!("CSV output is not UTF-8: {}", e)))
}
