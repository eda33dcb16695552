//! Durable key-value persistence for the medication and reminder records.
//!
//! State lives in two named records, `medications` and `reminders`, each
//! holding a JSON-encoded collection. Reads never fail the caller: a record
//! that is missing, unreadable or malformed is treated as empty. Writes
//! report failures as [`Error::Persistence`] so callers can warn and carry on
//! with their in-memory state.

use crate::{Error, MedicationEntry, PersistedState, Reminder, Result};
use fs2::FileExt;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::PathBuf;
use tempfile::NamedTempFile;

/// Record key for the medication collection
pub const MEDICATIONS_KEY: &str = "medications";
/// Record key for the reminder collection
pub const REMINDERS_KEY: &str = "reminders";

/// Backing key-value storage
pub trait Storage {
    /// Read a record; `Ok(None)` when the key was never written
    fn read(&self, key: &str) -> Result<Option<String>>;

    /// Replace a record
    fn write(&mut self, key: &str, value: &str) -> Result<()>;
}

/// File-backed storage, one `<key>.json` file per record
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Create storage rooted at `dir`; the directory is created on first write
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl Storage for FileStorage {
    fn read(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }

        let file = File::open(&path)?;
        // Acquire shared lock for reading
        file.lock_shared()?;

        let mut contents = String::new();
        let read = std::io::BufReader::new(&file).read_to_string(&mut contents);
        let _ = file.unlock();
        read?;

        Ok(Some(contents))
    }

    /// Atomically replace the record by writing a synced temp file in the
    /// same directory and renaming it over the original.
    fn write(&mut self, key: &str, value: &str) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);

        let temp = NamedTempFile::new_in(&self.dir)?;

        // Exclusive lock serializes concurrent writers on the temp file
        temp.as_file().lock_exclusive()?;

        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            writer.write_all(value.as_bytes())?;
            writer.flush()?;
        }

        temp.as_file().sync_all()?;
        temp.as_file().unlock()?;

        temp.persist(&path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!("Wrote record {:?}", path);
        Ok(())
    }
}

/// In-process storage for embedding and tests
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    records: HashMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self.records.get(key).cloned())
    }

    fn write(&mut self, key: &str, value: &str) -> Result<()> {
        self.records.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Persistence store over a [`Storage`] backend
pub struct Store<S: Storage> {
    storage: S,
}

impl<S: Storage> Store<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Load both collections.
    ///
    /// Each record is read independently; any failure degrades that record
    /// to an empty collection with a warning.
    pub fn load(&self) -> PersistedState {
        let medications: Vec<MedicationEntry> = self.load_record(MEDICATIONS_KEY);
        let reminders: Vec<Reminder> = self.load_record(REMINDERS_KEY);

        tracing::debug!(
            "Loaded {} medications and {} reminders",
            medications.len(),
            reminders.len()
        );

        PersistedState {
            medications,
            reminders,
            exported_at: None,
        }
    }

    /// Write both collections.
    ///
    /// Both records are attempted even if the first fails; the first failure
    /// is reported.
    pub fn save(&mut self, state: &PersistedState) -> Result<()> {
        let medications = self.save_record(MEDICATIONS_KEY, &state.medications);
        let reminders = self.save_record(REMINDERS_KEY, &state.reminders);
        medications.and(reminders)
    }

    fn load_record<T: DeserializeOwned>(&self, key: &str) -> Vec<T> {
        let contents = match self.storage.read(key) {
            Ok(Some(contents)) => contents,
            Ok(None) => {
                tracing::info!("No {} record found, starting empty", key);
                return Vec::new();
            }
            Err(e) => {
                tracing::warn!("Unable to read {} record: {}. Using empty list.", key, e);
                return Vec::new();
            }
        };

        if contents.trim().is_empty() {
            return Vec::new();
        }

        match serde_json::from_str::<Vec<T>>(&contents) {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!("Failed to parse {} record: {}. Using empty list.", key, e);
                Vec::new()
            }
        }
    }

    fn save_record<T: serde::Serialize>(&mut self, key: &str, items: &[T]) -> Result<()> {
        let contents = serde_json::to_string(items)?;
        self.storage
            .write(key, &contents)
            .map_err(|e| Error::Persistence(format!("failed to write {} record: {}", key, e)))
    }
}
