//! In-memory remote store with switchable availability, for tests and demos.

use std::sync::{Mutex, MutexGuard};

use super::{RemoteError, RemoteRecord, RemoteRecordStore, RemoteResult};
use crate::models::RecordFields;

#[derive(Debug)]
struct StoredRecord {
    remote_id: String,
    owner_id: String,
    fields: RecordFields,
    created_at: String,
}

#[derive(Debug)]
struct MemoryState {
    records: Vec<StoredRecord>,
    next_id: u64,
    available: bool,
    fail_deletes: bool,
    create_calls: usize,
    delete_calls: Vec<String>,
}

/// Remote store kept in process memory. Identifiers are `r<n>`.
#[derive(Debug)]
pub struct MemoryRemoteStore {
    state: Mutex<MemoryState>,
}

impl Default for MemoryRemoteStore {
    fn default() -> Self {
        Self::starting_at(1)
    }
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store whose first assigned identifier is `r<first_id>`.
    pub fn starting_at(first_id: u64) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                records: Vec::new(),
                next_id: first_id,
                available: true,
                fail_deletes: false,
                create_calls: 0,
                delete_calls: Vec::new(),
            }),
        }
    }

    /// Simulate connectivity loss or recovery.
    pub fn set_available(&self, available: bool) {
        self.lock().available = available;
    }

    /// Make deletes fail while creates still succeed.
    pub fn set_fail_deletes(&self, fail: bool) {
        self.lock().fail_deletes = fail;
    }

    /// Insert a record directly, as if created from another device.
    pub fn seed(&self, owner_id: &str, fields: RecordFields) -> String {
        let mut state = self.lock();
        let remote_id = format!("r{}", state.next_id);
        state.next_id += 1;
        state.records.push(StoredRecord {
            remote_id: remote_id.clone(),
            owner_id: owner_id.to_string(),
            fields,
            created_at: chrono::Utc::now().to_rfc3339(),
        });
        remote_id
    }

    /// Identifiers currently stored.
    pub fn remote_ids(&self) -> Vec<String> {
        self.lock()
            .records
            .iter()
            .map(|r| r.remote_id.clone())
            .collect()
    }

    /// Number of create attempts, successful or not.
    pub fn create_calls(&self) -> usize {
        self.lock().create_calls
    }

    /// Identifiers passed to delete attempts, successful or not.
    pub fn delete_calls(&self) -> Vec<String> {
        self.lock().delete_calls.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl RemoteRecordStore for MemoryRemoteStore {
    fn create(&self, owner_id: &str, fields: &RecordFields) -> RemoteResult<String> {
        {
            let mut state = self.lock();
            state.create_calls += 1;
            if !state.available {
                return Err(RemoteError::Unavailable("network unreachable".into()));
            }
        }
        Ok(self.seed(owner_id, fields.clone()))
    }

    fn list_by_owner(&self, owner_id: &str) -> RemoteResult<Vec<RemoteRecord>> {
        let state = self.lock();
        if !state.available {
            return Err(RemoteError::Unavailable("network unreachable".into()));
        }
        Ok(state
            .records
            .iter()
            .filter(|r| r.owner_id == owner_id)
            .map(|r| RemoteRecord {
                remote_id: r.remote_id.clone(),
                fields: r.fields.clone(),
                created_at: Some(r.created_at.clone()),
            })
            .collect())
    }

    fn delete_by_id(&self, remote_id: &str) -> RemoteResult<()> {
        let mut state = self.lock();
        state.delete_calls.push(remote_id.to_string());
        if !state.available {
            return Err(RemoteError::Unavailable("network unreachable".into()));
        }
        if state.fail_deletes {
            return Err(RemoteError::Rejected("permission denied".into()));
        }
        state.records.retain(|r| r.remote_id != remote_id);
        Ok(())
    }
}
