//! In-memory medication log and its paired reminders.
//!
//! Entries are kept most-recent-first. Every reminder references an entry
//! in the log; removing an entry removes its reminders with it.

use crate::{Error, MedicationEntry, PersistedState, Reminder, Result};
use std::collections::HashSet;
use uuid::Uuid;

/// What a successful `remove` took out of the log
#[derive(Clone, Debug, PartialEq)]
pub struct Removal {
    pub entry: MedicationEntry,
    pub reminders: Vec<Reminder>,
}

/// Result of merging an imported state into the log
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MergeOutcome {
    pub entries_added: usize,
    pub reminders_added: Vec<Reminder>,
}

/// Ordered collection of medication entries plus their reminders
#[derive(Clone, Debug, Default)]
pub struct MedicationLog {
    entries: Vec<MedicationEntry>,
    reminders: Vec<Reminder>,
}

impl MedicationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a log from persisted state, keeping the persisted order
    pub fn from_state(state: PersistedState) -> Self {
        Self {
            entries: state.medications,
            reminders: state.reminders,
        }
    }

    /// Snapshot for persistence or export
    pub fn to_state(&self) -> PersistedState {
        PersistedState {
            medications: self.entries.clone(),
            reminders: self.reminders.clone(),
            exported_at: None,
        }
    }

    pub fn entries(&self) -> &[MedicationEntry] {
        &self.entries
    }

    pub fn reminders(&self) -> &[Reminder] {
        &self.reminders
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: Uuid) -> Option<&MedicationEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn reminder(&self, id: Uuid) -> Option<&Reminder> {
        self.reminders.iter().find(|r| r.id == id)
    }

    pub fn reminder_mut(&mut self, id: Uuid) -> Option<&mut Reminder> {
        self.reminders.iter_mut().find(|r| r.id == id)
    }

    /// Insert at the front (most recent first)
    pub fn add(&mut self, entry: MedicationEntry) {
        tracing::debug!("Adding medication entry {}", entry.id);
        self.entries.insert(0, entry);
    }

    /// Attach a reminder to an entry already in the log
    pub fn add_reminder(&mut self, reminder: Reminder) -> Result<()> {
        if self.get(reminder.medication_id).is_none() {
            return Err(Error::Validation(format!(
                "no medication entry {} for reminder",
                reminder.medication_id
            )));
        }
        if self.reminder(reminder.id).is_some() {
            return Err(Error::Validation(format!(
                "reminder {} already exists",
                reminder.id
            )));
        }
        self.reminders.push(reminder);
        Ok(())
    }

    /// Remove an entry and every reminder that points at it.
    ///
    /// Returns `None` when no entry has this id.
    pub fn remove(&mut self, id: Uuid) -> Option<Removal> {
        let index = self.entries.iter().position(|e| e.id == id)?;
        let entry = self.entries.remove(index);

        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.reminders)
            .into_iter()
            .partition(|r| r.medication_id == id);
        self.reminders = kept;

        tracing::debug!(
            "Removed medication entry {} with {} reminder(s)",
            id,
            removed.len()
        );
        Some(Removal {
            entry,
            reminders: removed,
        })
    }

    /// Case-insensitive search over name, dosage, frequency and notes.
    ///
    /// A blank query returns every entry in display order.
    pub fn filter(&self, query: &str) -> Vec<&MedicationEntry> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return self.entries.iter().collect();
        }
        self.entries.iter().filter(|e| e.matches(&needle)).collect()
    }

    /// Union an imported state into the log; existing ids win.
    ///
    /// New entries are appended after the current ones. Reminders are merged
    /// by the same rule and only when their entry is present afterwards.
    pub fn merge(&mut self, incoming: PersistedState) -> MergeOutcome {
        let mut outcome = MergeOutcome::default();

        let mut entry_ids: HashSet<Uuid> = self.entries.iter().map(|e| e.id).collect();
        for entry in incoming.medications {
            if entry_ids.insert(entry.id) {
                self.entries.push(entry);
                outcome.entries_added += 1;
            }
        }

        let mut reminder_ids: HashSet<Uuid> = self.reminders.iter().map(|r| r.id).collect();
        for reminder in incoming.reminders {
            if !entry_ids.contains(&reminder.medication_id) {
                tracing::warn!(
                    "Skipping imported reminder {} for unknown medication {}",
                    reminder.id,
                    reminder.medication_id
                );
                continue;
            }
            if reminder_ids.insert(reminder.id) {
                self.reminders.push(reminder.clone());
                outcome.reminders_added.push(reminder);
            }
        }

        tracing::info!(
            "Merged {} entries and {} reminders",
            outcome.entries_added,
            outcome.reminders_added.len()
        );
        outcome
    }

    /// Drop entries and reminders that break the log's invariants: blank
    /// names and repeated ids. The first occurrence of an id is kept.
    ///
    /// Returns how many records were dropped.
    pub fn drop_invalid(&mut self) -> usize {
        let before = self.entries.len() + self.reminders.len();

        let mut entry_ids = HashSet::new();
        self.entries
            .retain(|e| !e.name.trim().is_empty() && entry_ids.insert(e.id));

        let mut reminder_ids = HashSet::new();
        self.reminders.retain(|r| reminder_ids.insert(r.id));

        let dropped = before - (self.entries.len() + self.reminders.len());
        if dropped > 0 {
            tracing::warn!("Dropped {} invalid or duplicate record(s)", dropped);
        }
        dropped
    }

    /// Drop reminders whose entry no longer exists
    pub fn prune_orphans(&mut self) -> Vec<Reminder> {
        let entry_ids: HashSet<Uuid> = self.entries.iter().map(|e| e.id).collect();
        let (kept, orphans): (Vec<_>, Vec<_>) = std::mem::take(&mut self.reminders)
            .into_iter()
            .partition(|r| entry_ids.contains(&r.medication_id));
        self.reminders = kept;

        if !orphans.is_empty() {
            tracing::warn!("Pruned {} orphaned reminder(s)", orphans.len());
        }
        orphans
    }
}
