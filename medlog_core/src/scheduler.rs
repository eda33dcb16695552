//! Daily reminder scheduling.
//!
//! Each reminder is either ARMED (one deferred fire pending) or DISARMED.
//! Arming spawns a single local task per reminder id; the task sleeps until
//! the next occurrence of the reminder's time of day, delivers the
//! notification, then computes the following occurrence from the original
//! anchor and sleeps again. Re-arming replaces the task, never stacks it.
//!
//! The scheduler owns the [`LocalSet`] its tasks live on, so arming works
//! from any context. Fires only make progress while the set is driven
//! through [`ReminderScheduler::run_until`]. Everything runs on one thread;
//! a disarm issued before a fire's deadline always wins.
//!
//! When notifications are unavailable or denied at fire time the fire is
//! skipped silently and the recurrence still advances to the next day.

use crate::{Clock, Error, MedicationEntry, Notifier, Reminder, Result, StateChange, TimeOfDay};
use chrono::{DateTime, NaiveDateTime, TimeZone};
use std::cell::RefCell;
use std::collections::HashMap;
use std::future::Future;
use std::rc::Rc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::{JoinHandle, LocalSet};
use uuid::Uuid;

const NOTIFICATION_TITLE: &str = "Medication reminder";

/// The next occurrence of a reminder and how long until it
#[derive(Clone, Debug, PartialEq)]
pub struct NextFire<Tz: TimeZone> {
    pub at: DateTime<Tz>,
    pub delay: Duration,
}

/// Compute the next instant strictly after `now` whose wall-clock time is
/// `time_of_day`.
///
/// Today's slot is used when it is still ahead; otherwise the same time
/// tomorrow. A slot that falls into a DST gap moves one hour later.
pub fn compute_next_fire<Tz: TimeZone>(time_of_day: TimeOfDay, now: &DateTime<Tz>) -> NextFire<Tz> {
    let tz = now.timezone();
    let today = now.date_naive();

    for date in [Some(today), today.succ_opt()].into_iter().flatten() {
        let Some(candidate) = resolve_local(&tz, date.and_time(time_of_day.as_naive())) else {
            continue;
        };
        if candidate > *now {
            let delay = (candidate.clone() - now.clone())
                .to_std()
                .unwrap_or(Duration::ZERO);
            return NextFire {
                at: candidate,
                delay,
            };
        }
    }

    // Only reachable at the end of the representable calendar
    let delay = Duration::from_secs(24 * 60 * 60);
    NextFire {
        at: now.clone() + chrono::Duration::days(1),
        delay,
    }
}

fn resolve_local<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> Option<DateTime<Tz>> {
    tz.from_local_datetime(&naive)
        .earliest()
        .or_else(|| {
            tz.from_local_datetime(&(naive + chrono::Duration::hours(1)))
                .earliest()
        })
}

/// One pending fire loop
struct Armed {
    generation: u64,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct Registry {
    armed: HashMap<Uuid, Armed>,
    next_generation: u64,
}

impl Registry {
    fn is_current(&self, id: Uuid, generation: u64) -> bool {
        self.armed
            .get(&id)
            .is_some_and(|armed| armed.generation == generation)
    }
}

/// Whether `notifier` can deliver right now
fn delivery_permission(notifier: &dyn Notifier) -> Result<()> {
    if !notifier.is_available() {
        return Err(Error::Permission(
            "notifications are not available on this system".into(),
        ));
    }
    if !notifier.permission_granted() {
        return Err(Error::Permission(
            "notification permission has not been granted".into(),
        ));
    }
    Ok(())
}

/// Everything a fire loop needs, captured at arm time
struct FireJob {
    reminder_id: Uuid,
    generation: u64,
    time_of_day: TimeOfDay,
    medication_name: String,
    dosage: String,
}

impl FireJob {
    fn body(&self) -> String {
        if self.dosage.is_empty() {
            format!("Time to take {}", self.medication_name)
        } else {
            format!("Time to take {} ({})", self.medication_name, self.dosage)
        }
    }
}

/// Arms, re-arms and cancels daily reminder fires
pub struct ReminderScheduler<C: Clock + 'static> {
    clock: Rc<C>,
    notifier: Rc<dyn Notifier>,
    registry: Rc<RefCell<Registry>>,
    events: broadcast::Sender<StateChange>,
    tasks: LocalSet,
}

impl<C: Clock + 'static> ReminderScheduler<C> {
    pub fn new(
        clock: Rc<C>,
        notifier: Rc<dyn Notifier>,
        events: broadcast::Sender<StateChange>,
    ) -> Self {
        Self {
            clock,
            notifier,
            registry: Rc::new(RefCell::new(Registry::default())),
            events,
            tasks: LocalSet::new(),
        }
    }

    /// `Ok` when reminders can be delivered, otherwise an
    /// [`Error::Permission`] describing why not
    pub fn check_permission(&self) -> Result<()> {
        delivery_permission(self.notifier.as_ref())
    }

    /// Drive pending fires until `future` completes
    pub async fn run_until<F: Future>(&self, future: F) -> F::Output {
        self.tasks.run_until(future).await
    }

    /// Arm a reminder, replacing any pending fire for the same id.
    ///
    /// An inactive reminder is disarmed instead. When notifications are
    /// unavailable or denied nothing changes; call again once permission is
    /// granted. Returns whether a fire is now pending.
    pub fn arm(&self, reminder: &Reminder, medication: &MedicationEntry) -> bool {
        if !reminder.active {
            self.disarm(reminder.id);
            tracing::debug!(reminder = %reminder.id, "Reminder inactive, not arming");
            return false;
        }

        if let Err(e) = self.check_permission() {
            tracing::info!(reminder = %reminder.id, "{}, reminder left disarmed", e);
            return false;
        }

        let mut registry = self.registry.borrow_mut();
        registry.next_generation += 1;
        let generation = registry.next_generation;

        let job = FireJob {
            reminder_id: reminder.id,
            generation,
            time_of_day: reminder.time_of_day,
            medication_name: medication.name.clone(),
            dosage: medication.dosage.clone(),
        };
        let handle = self.tasks.spawn_local(fire_loop(
            job,
            self.clock.clone(),
            self.notifier.clone(),
            self.registry.clone(),
            self.events.clone(),
        ));

        if let Some(previous) = registry.armed.insert(reminder.id, Armed { generation, handle }) {
            previous.handle.abort();
            tracing::debug!(reminder = %reminder.id, "Replaced pending fire");
        }

        tracing::info!(
            reminder = %reminder.id,
            time = %reminder.time_of_day,
            "Armed reminder for {}",
            medication.name
        );
        true
    }

    /// Cancel any pending fire. Safe on unknown or already-disarmed ids.
    pub fn disarm(&self, id: Uuid) -> bool {
        match self.registry.borrow_mut().armed.remove(&id) {
            Some(armed) => {
                armed.handle.abort();
                tracing::debug!(reminder = %id, "Disarmed reminder");
                true
            }
            None => false,
        }
    }

    /// Arm every active reminder that still has its medication entry.
    ///
    /// Used at startup, since pending fires do not survive a restart.
    pub fn rearm_all(&self, reminders: &[Reminder], medications: &[MedicationEntry]) -> usize {
        let mut armed = 0;
        for reminder in reminders.iter().filter(|r| r.active) {
            let Some(medication) = medications.iter().find(|m| m.id == reminder.medication_id)
            else {
                tracing::warn!(
                    reminder = %reminder.id,
                    "Skipping reminder without a medication entry"
                );
                continue;
            };
            if self.arm(reminder, medication) {
                armed += 1;
            }
        }
        tracing::info!("Re-armed {} reminder(s)", armed);
        armed
    }

    pub fn is_armed(&self, id: Uuid) -> bool {
        self.registry.borrow().armed.contains_key(&id)
    }

    /// Number of reminders with a pending fire
    pub fn armed_count(&self) -> usize {
        self.registry.borrow().armed.len()
    }

    /// Cancel every pending fire
    pub fn disarm_all(&self) {
        for (_, armed) in self.registry.borrow_mut().armed.drain() {
            armed.handle.abort();
        }
    }
}

impl<C: Clock + 'static> Drop for ReminderScheduler<C> {
    fn drop(&mut self) {
        self.disarm_all();
    }
}

async fn fire_loop<C: Clock>(
    job: FireJob,
    clock: Rc<C>,
    notifier: Rc<dyn Notifier>,
    registry: Rc<RefCell<Registry>>,
    events: broadcast::Sender<StateChange>,
) {
    let mut last_fire: Option<DateTime<C::Tz>> = None;

    loop {
        let now = clock.now();
        // Never schedule from before the previous fire, so a wake that lands
        // slightly early cannot fire the same slot twice.
        let reference = match last_fire.take() {
            Some(previous) if previous >= now => previous,
            _ => now.clone(),
        };
        let next = compute_next_fire(job.time_of_day, &reference);
        let delay = (next.at.clone() - now).to_std().unwrap_or(Duration::ZERO);

        tracing::debug!(reminder = %job.reminder_id, ?delay, "Waiting for next fire");
        tokio::time::sleep(delay).await;

        if !registry.borrow().is_current(job.reminder_id, job.generation) {
            return;
        }

        let notified = deliver(&job, notifier.as_ref());
        let _ = events.send(StateChange::ReminderFired {
            reminder_id: job.reminder_id,
            notified,
        });

        last_fire = Some(next.at);
    }
}

fn deliver(job: &FireJob, notifier: &dyn Notifier) -> bool {
    if let Err(e) = delivery_permission(notifier) {
        tracing::debug!(reminder = %job.reminder_id, "{}, skipping delivery", e);
        return false;
    }

    match notifier.show(NOTIFICATION_TITLE, &job.body(), &job.reminder_id.to_string()) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(reminder = %job.reminder_id, "Failed to show reminder: {}", e);
            false
        }
    }
}
