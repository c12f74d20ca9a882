//! Request handlers: read reminders, report/undo doses, query and mark pings.
//!
//! Handlers take `now` explicitly; the caller owns the clock.

use cadence_core::{
    CoreError, DoseRecord, PingFilter, PingReport, Reminder, ReminderKey, ReminderPatch, last_dose,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{ServiceError, ServiceResult};
use crate::store::{Mutation, ReminderQuery, ReminderStore, Snapshot};

/// Reply to a dose report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TakenAck {
    pub message: String,
    /// Emote id picked by cycle index, if the reminder has any configured.
    pub emote: Option<i64>,
    pub cycle: u32,
    pub timestamp: DateTime<Utc>,
    pub center: DateTime<Utc>,
}

pub struct ReminderService<S> {
    store: S,
}

impl<S: ReminderStore> ReminderService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn get_reminders(&self, query: &ReminderQuery) -> ServiceResult<Vec<Reminder>> {
        Ok(self
            .store
            .query(query)?
            .into_iter()
            .map(|s| s.reminder)
            .collect())
    }

    /// Create the reminder if it does not exist, otherwise update it.
    pub fn put_reminder(&self, id: ReminderKey, patch: &ReminderPatch, now: DateTime<Utc>) -> ServiceResult<Reminder> {
        self.with_retry(&id, || match self.store.snapshot(&id)? {
            Some(snap) => {
                let mut reminder = snap.reminder;
                patch.apply(&mut reminder, now)?;
                self.store
                    .commit(&id, Some(snap.revision), vec![Mutation::Upsert(reminder.clone())])?;
                info!(reminder = %id, "reminder updated");
                Ok(reminder)
            }
            None => {
                let reminder = Reminder::create(id, patch, now)?;
                self.store.commit(&id, None, vec![Mutation::Upsert(reminder.clone())])?;
                info!(reminder = %id, timezone = %reminder.timezone, "reminder created");
                Ok(reminder)
            }
        })
    }

    /// Delete a reminder and its whole history.
    pub fn delete_reminder(&self, id: ReminderKey) -> ServiceResult<()> {
        self.with_retry(&id, || {
            let snap = self.require(&id)?;
            self.store.commit(&id, Some(snap.revision), vec![Mutation::Delete])?;
            info!(reminder = %id, "reminder deleted");
            Ok(())
        })
    }

    /// Record a dose at `at` (default: `now`).
    ///
    /// Rejects instants in the future or before the newest recorded dose.
    pub fn report_taken(
        &self,
        id: ReminderKey,
        at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> ServiceResult<TakenAck> {
        let at = at.unwrap_or(now);
        if at > now {
            return Err(CoreError::invalid("time cannot be in the future").into());
        }

        self.with_retry(&id, || {
            let snap = self.require(&id)?;
            let config = snap.reminder.schedule()?;
            let last = last_dose(config, &snap.tail, at);
            if at < last.timestamp {
                return Err(CoreError::invalid("time cannot be before previously recorded time").into());
            }
            let taken = last.taken(at);

            let mut reminder = snap.reminder;
            let mut mutations = vec![Mutation::AppendDose(taken.to_record())];
            if reminder.uses_alternating() {
                reminder.alternating_flag = !reminder.alternating_flag;
                mutations.push(Mutation::Upsert(reminder.clone()));
            }
            self.store.commit(&id, Some(snap.revision), mutations)?;
            info!(
                reminder = %id,
                cycle = taken.cycle,
                center = %taken.center,
                late_secs = taken.late.num_seconds(),
                "dose recorded"
            );

            Ok(TakenAck {
                message: reminder.response_message.clone(),
                emote: reminder.emote_for_cycle(taken.cycle),
                cycle: taken.cycle,
                timestamp: taken.timestamp,
                center: taken.center,
            })
        })
    }

    /// Remove the most recent dose. Returns it, or `None` if there was none.
    pub fn undo_taken(&self, id: ReminderKey) -> ServiceResult<Option<DoseRecord>> {
        self.with_retry(&id, || {
            let snap = self.require(&id)?;
            let Some(newest) = snap.tail.first().copied() else {
                debug!(reminder = %id, "nothing to undo");
                return Ok(None);
            };

            let mut reminder = snap.reminder;
            let mut mutations = vec![Mutation::PopDose];
            if reminder.uses_alternating() {
                reminder.alternating_flag = !reminder.alternating_flag;
                mutations.push(Mutation::Upsert(reminder));
            }
            self.store.commit(&id, Some(snap.revision), mutations)?;
            info!(reminder = %id, timestamp = %newest.timestamp, "dose undone");
            Ok(Some(newest))
        })
    }

    pub fn ping_status(
        &self,
        query: &ReminderQuery,
        filter: PingFilter,
        now: DateTime<Utc>,
    ) -> ServiceResult<Vec<PingReport>> {
        let mut out = Vec::new();
        for snap in self.store.query(query)? {
            let report = PingReport::build(&snap.reminder, &snap.tail, now)?;
            if filter.admits(report.flags()) {
                out.push(report);
            }
        }
        Ok(out)
    }

    /// Note that a notification for this reminder went out at `now`.
    pub fn mark_pinged(&self, id: ReminderKey, now: DateTime<Utc>) -> ServiceResult<()> {
        self.with_retry(&id, || {
            let snap = self.require(&id)?;
            let mut reminder = snap.reminder;
            reminder.last_ping_utc = now;
            self.store
                .commit(&id, Some(snap.revision), vec![Mutation::Upsert(reminder)])?;
            debug!(reminder = %id, at = %now, "ping recorded");
            Ok(())
        })
    }

    fn require(&self, id: &ReminderKey) -> ServiceResult<Snapshot> {
        self.store
            .snapshot(id)?
            .ok_or_else(|| CoreError::NotFound(id.to_string()).into())
    }

    /// Run a read-modify-write, redoing it once if another writer got in
    /// between. A second conflict is reported as transient.
    fn with_retry<T>(&self, id: &ReminderKey, mut op: impl FnMut() -> ServiceResult<T>) -> ServiceResult<T> {
        match op() {
            Err(e) if e.is_conflict() => {
                warn!(reminder = %id, error = %e, "conflicting update, retrying");
                op().map_err(|e| {
                    if e.is_conflict() {
                        ServiceError::Transient(e.to_string())
                    } else {
                        e
                    }
                })
            }
            other => other,
        }
    }
}
