use std::sync::{Mutex, MutexGuard};

use cadence_core::ReminderKey;

use crate::error::{ServiceError, ServiceResult};
use crate::store::{Database, Mutation, ReminderQuery, ReminderStore, Snapshot};

/// Process-local store; handy for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryStore {
    db: Mutex<Database>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> ServiceResult<MutexGuard<'_, Database>> {
        self.db
            .lock()
            .map_err(|_| ServiceError::Transient("memory store lock poisoned".to_string()))
    }
}

impl ReminderStore for MemoryStore {
    fn query(&self, query: &ReminderQuery) -> ServiceResult<Vec<Snapshot>> {
        Ok(self.lock()?.query(query))
    }

    fn snapshot(&self, id: &ReminderKey) -> ServiceResult<Option<Snapshot>> {
        Ok(self.lock()?.snapshot(id))
    }

    fn commit(&self, id: &ReminderKey, expected: Option<u64>, mutations: Vec<Mutation>) -> ServiceResult<u64> {
        self.lock()?.commit(id, expected, mutations)
    }
}
