//! Persistence contract and the shared in-memory table model.
//!
//! Every write goes through [`ReminderStore::commit`] with the revision the
//! caller read. A mismatch means someone else committed in between, and the
//! whole read-modify-write has to be redone.

use std::collections::BTreeMap;

use cadence_core::{CoreError, DoseRecord, HISTORY_TAIL, Reminder, ReminderKey};
use serde::{Deserialize, Serialize};

use crate::error::ServiceResult;

/// Optional narrowing by identity parts. Only active reminders are returned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderQuery {
    pub guild: Option<u64>,
    pub member: Option<u64>,
    pub key: Option<u32>,
}

impl ReminderQuery {
    pub fn exact(id: ReminderKey) -> Self {
        Self {
            guild: Some(id.guild),
            member: Some(id.member),
            key: Some(id.key),
        }
    }

    pub fn matches(&self, id: &ReminderKey) -> bool {
        self.guild.is_none_or(|g| g == id.guild)
            && self.member.is_none_or(|m| m == id.member)
            && self.key.is_none_or(|k| k == id.key)
    }
}

/// A consistent read of one reminder.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub reminder: Reminder,
    pub revision: u64,
    /// Newest first, at most [`HISTORY_TAIL`] records.
    pub tail: Vec<DoseRecord>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    Upsert(Reminder),
    Delete,
    AppendDose(DoseRecord),
    /// Remove the most recent record, if any.
    PopDose,
}

pub trait ReminderStore: Send + Sync {
    /// Active reminders matching `query`, ordered by member then key.
    fn query(&self, query: &ReminderQuery) -> ServiceResult<Vec<Snapshot>>;

    fn snapshot(&self, id: &ReminderKey) -> ServiceResult<Option<Snapshot>>;

    /// Apply `mutations` atomically if the stored revision still equals
    /// `expected` (`None` = the reminder must not exist). Returns the new
    /// revision, or 0 when the reminder was deleted.
    fn commit(&self, id: &ReminderKey, expected: Option<u64>, mutations: Vec<Mutation>) -> ServiceResult<u64>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct Row {
    pub reminder: Reminder,
    pub revision: u64,
    /// Oldest first; insertion order is chronological order.
    pub history: Vec<DoseRecord>,
}

impl Row {
    fn snapshot(&self) -> Snapshot {
        Snapshot {
            reminder: self.reminder.clone(),
            revision: self.revision,
            tail: self.history.iter().rev().take(HISTORY_TAIL).copied().collect(),
        }
    }
}

/// All rows, keyed by identity. Shared by the memory and file stores.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub(crate) struct Database {
    pub rows: BTreeMap<String, Row>,
}

fn row_key(id: &ReminderKey) -> String {
    format!("{}/{}/{}", id.guild, id.member, id.key)
}

impl Database {
    pub fn query(&self, query: &ReminderQuery) -> Vec<Snapshot> {
        let mut out: Vec<Snapshot> = self
            .rows
            .values()
            .filter(|row| row.reminder.active && query.matches(&row.reminder.id))
            .map(Row::snapshot)
            .collect();
        out.sort_by_key(|s| (s.reminder.id.member, s.reminder.id.key, s.reminder.id.guild));
        out
    }

    pub fn snapshot(&self, id: &ReminderKey) -> Option<Snapshot> {
        self.rows.get(&row_key(id)).map(Row::snapshot)
    }

    pub fn commit(&mut self, id: &ReminderKey, expected: Option<u64>, mutations: Vec<Mutation>) -> ServiceResult<u64> {
        let key = row_key(id);
        let current = self.rows.get(&key).map(|row| row.revision);
        if current != expected {
            return Err(CoreError::ConcurrencyConflict(format!(
                "{id}: expected revision {expected:?}, found {current:?}"
            ))
            .into());
        }

        let mut row = self.rows.get(&key).cloned();
        for mutation in mutations {
            match mutation {
                Mutation::Upsert(reminder) => match row.as_mut() {
                    Some(existing) => existing.reminder = reminder,
                    None => {
                        row = Some(Row {
                            reminder,
                            revision: 0,
                            history: Vec::new(),
                        })
                    }
                },
                Mutation::Delete => row = None,
                Mutation::AppendDose(record) => {
                    let existing = row.as_mut().ok_or_else(|| CoreError::NotFound(id.to_string()))?;
                    existing.history.push(record);
                }
                Mutation::PopDose => {
                    let existing = row.as_mut().ok_or_else(|| CoreError::NotFound(id.to_string()))?;
                    existing.history.pop();
                }
            }
        }

        match row {
            Some(mut row) => {
                row.revision = current.unwrap_or(0) + 1;
                let revision = row.revision;
                self.rows.insert(key, row);
                Ok(revision)
            }
            None => {
                self.rows.remove(&key);
                Ok(0)
            }
        }
    }
}
