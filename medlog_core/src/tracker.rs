//! Composition root tying the store, the medication log and the scheduler
//! together.
//!
//! Every mutating operation updates the in-memory log first, flushes both
//! records, then arms or disarms reminders. A failed flush is logged and
//! published as [`StateChange::PersistenceFailed`]; the operation itself
//! still succeeds. UI adapters follow changes through [`Tracker::subscribe`].
//!
//! Operations that arm reminders never need an async context. Pending fires
//! advance only while the caller awaits [`Tracker::run_until`].

use crate::backup;
use crate::medication_log::{MedicationLog, MergeOutcome, Removal};
use crate::scheduler::{compute_next_fire, NextFire, ReminderScheduler};
use crate::store::{Storage, Store};
use crate::{Clock, Error, MedicationEntry, NewEntry, Notifier, Reminder, Result, StateChange};
use chrono::{DateTime, TimeZone, Utc};
use std::future::Future;
use std::rc::Rc;
use tokio::sync::broadcast;
use uuid::Uuid;

const EVENT_CAPACITY: usize = 64;

/// What `add` created
#[derive(Clone, Debug, PartialEq)]
pub struct Added {
    pub entry: MedicationEntry,
    pub reminder: Option<Reminder>,
}

/// A reminder with its medication name and next occurrence
#[derive(Clone, Debug)]
pub struct Upcoming<Tz: TimeZone> {
    pub reminder: Reminder,
    pub medication_name: String,
    /// `None` for inactive reminders
    pub next: Option<NextFire<Tz>>,
    pub armed: bool,
}

pub struct Tracker<S: Storage, C: Clock + 'static> {
    store: Store<S>,
    log: MedicationLog,
    clock: Rc<C>,
    scheduler: ReminderScheduler<C>,
    events: broadcast::Sender<StateChange>,
}

impl<S: Storage, C: Clock + 'static> Tracker<S, C> {
    /// Load persisted state, dropping blank-named or duplicate records and
    /// reminders that lost their entry. A cleaned state is written back.
    ///
    /// Reminders are not armed yet; call [`Tracker::resume_reminders`].
    pub fn open(storage: S, clock: Rc<C>, notifier: Rc<dyn Notifier>) -> Self {
        let store = Store::new(storage);
        let mut log = MedicationLog::from_state(store.load());
        let dropped = log.drop_invalid();
        let pruned = log.prune_orphans();

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let scheduler = ReminderScheduler::new(clock.clone(), notifier, events.clone());

        let mut tracker = Self {
            store,
            log,
            clock,
            scheduler,
            events,
        };
        if dropped > 0 || !pruned.is_empty() {
            tracker.flush();
        }
        tracker
    }

    /// Arm every active reminder
    pub fn resume_reminders(&self) -> usize {
        self.scheduler
            .rearm_all(self.log.reminders(), self.log.entries())
    }

    /// Deliver reminder fires until `future` completes
    pub async fn run_until<F: Future>(&self, future: F) -> F::Output {
        self.scheduler.run_until(future).await
    }

    /// Why reminders cannot be delivered, if they cannot
    pub fn notification_status(&self) -> Result<()> {
        self.scheduler.check_permission()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.events.subscribe()
    }

    pub fn entries(&self) -> &[MedicationEntry] {
        self.log.entries()
    }

    pub fn reminders(&self) -> &[Reminder] {
        self.log.reminders()
    }

    pub fn scheduler(&self) -> &ReminderScheduler<C> {
        &self.scheduler
    }

    pub fn storage(&self) -> &S {
        self.store.storage()
    }

    /// Log a new intake, optionally with a daily reminder.
    ///
    /// Validation failures leave everything untouched.
    pub fn add(&mut self, input: NewEntry) -> Result<Added> {
        let (entry, remind_at) = input.build(self.now_utc())?;

        self.log.add(entry.clone());
        let reminder = remind_at.map(|time| Reminder::new(entry.id, time));
        if let Some(reminder) = &reminder {
            self.log.add_reminder(reminder.clone())?;
        }

        self.flush();
        self.publish(StateChange::EntryAdded(entry.id));

        if let Some(reminder) = &reminder {
            self.scheduler.arm(reminder, &entry);
        }

        tracing::info!(entry = %entry.id, "Logged {}", entry.name);
        Ok(Added { entry, reminder })
    }

    /// Delete an entry together with its reminders. Unknown ids are ignored.
    pub fn remove(&mut self, id: Uuid) -> Option<Removal> {
        let Some(removal) = self.log.remove(id) else {
            tracing::debug!(entry = %id, "Nothing to remove");
            return None;
        };

        for reminder in &removal.reminders {
            self.scheduler.disarm(reminder.id);
        }

        self.flush();
        self.publish(StateChange::EntryRemoved(id));
        tracing::info!(entry = %id, "Removed {}", removal.entry.name);
        Some(removal)
    }

    pub fn filter(&self, query: &str) -> Vec<&MedicationEntry> {
        self.log.filter(query)
    }

    /// Switch a reminder on or off without deleting it
    pub fn set_reminder_active(&mut self, id: Uuid, active: bool) -> Result<Reminder> {
        let reminder = self
            .log
            .reminder_mut(id)
            .ok_or(Error::UnknownReminder(id))?;
        reminder.active = active;
        let reminder = reminder.clone();

        self.flush();
        self.publish(StateChange::ReminderToggled { id, active });

        if active {
            if let Some(entry) = self.log.get(reminder.medication_id) {
                self.scheduler.arm(&reminder, entry);
            }
        } else {
            self.scheduler.disarm(id);
        }
        Ok(reminder)
    }

    /// Every reminder with its next occurrence, soonest first
    pub fn upcoming(&self) -> Vec<Upcoming<C::Tz>> {
        let now = self.clock.now();
        let mut upcoming: Vec<_> = self
            .log
            .reminders()
            .iter()
            .map(|reminder| Upcoming {
                reminder: reminder.clone(),
                medication_name: self
                    .log
                    .get(reminder.medication_id)
                    .map(|e| e.name.clone())
                    .unwrap_or_default(),
                next: reminder
                    .active
                    .then(|| compute_next_fire(reminder.time_of_day, &now)),
                armed: self.scheduler.is_armed(reminder.id),
            })
            .collect();

        upcoming.sort_by_key(|u| (u.next.is_none(), u.next.as_ref().map(|n| n.delay)));
        upcoming
    }

    /// CSV export of every entry
    pub fn export_tabular(&self) -> Result<String> {
        backup::encode_tabular(self.log.entries())
    }

    /// Full backup stamped with the current time
    pub fn export_backup(&self) -> Result<String> {
        let mut state = self.log.to_state();
        state.exported_at = Some(self.now_utc());
        backup::encode(&state)
    }

    /// Decode a backup and merge it; existing ids win.
    ///
    /// A malformed payload is a [`Error::Format`] and nothing is merged.
    pub fn import_backup(&mut self, text: &str) -> Result<MergeOutcome> {
        let incoming = backup::decode(text)?;
        let outcome = self.log.merge(incoming);

        if outcome.entries_added > 0 || !outcome.reminders_added.is_empty() {
            self.flush();
        }

        for reminder in outcome.reminders_added.iter().filter(|r| r.active) {
            if let Some(entry) = self.log.get(reminder.medication_id) {
                self.scheduler.arm(reminder, entry);
            }
        }

        self.publish(StateChange::Imported {
            entries: outcome.entries_added,
            reminders: outcome.reminders_added.len(),
        });
        Ok(outcome)
    }

    fn now_utc(&self) -> DateTime<Utc> {
        self.clock.now().with_timezone(&Utc)
    }

    fn flush(&mut self) {
        match self.store.save(&self.log.to_state()) {
            Ok(()) => tracing::debug!("Flushed {} entries", self.log.len()),
            Err(e) => {
                tracing::warn!("{}. Continuing with in-memory state.", e);
                self.publish(StateChange::PersistenceFailed(e.to_string()));
            }
        }
    }

    fn publish(&self, change: StateChange) {
        // No subscribers is fine
        let _ = self.events.send(change);
    }
}
