//! Whole-file JSON store, in the same spirit as the rest of the app's state
//! under `~/.cadence`.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use cadence_core::ReminderKey;
use tracing::debug;

use crate::error::{ServiceError, ServiceResult};
use crate::store::{Database, Mutation, ReminderQuery, ReminderStore, Snapshot};

/// Reads the file on every call and rewrites it (temp file + rename) on
/// every commit. The revision check runs under an in-process lock.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn open(path: impl Into<PathBuf>) -> ServiceResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> ServiceResult<Database> {
        if !self.path.exists() {
            return Ok(Database::default());
        }
        let s = fs::read_to_string(&self.path)?;
        if s.trim().is_empty() {
            return Ok(Database::default());
        }
        Ok(serde_json::from_str(&s)?)
    }

    fn save(&self, db: &Database) -> ServiceResult<()> {
        let tmp = self.path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(db)?;
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), rows = db.rows.len(), "store saved");
        Ok(())
    }

    fn lock(&self) -> ServiceResult<MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|_| ServiceError::Transient("file store lock poisoned".to_string()))
    }
}

impl ReminderStore for JsonFileStore {
    fn query(&self, query: &ReminderQuery) -> ServiceResult<Vec<Snapshot>> {
        Ok(self.load()?.query(query))
    }

    fn snapshot(&self, id: &ReminderKey) -> ServiceResult<Option<Snapshot>> {
        Ok(self.load()?.snapshot(id))
    }

    fn commit(&self, id: &ReminderKey, expected: Option<u64>, mutations: Vec<Mutation>) -> ServiceResult<u64> {
        let _guard = self.lock()?;
        let mut db = self.load()?;
        let revision = db.commit(id, expected, mutations)?;
        self.save(&db)?;
        Ok(revision)
    }
}
