//! Remote record store adapter.
//!
//! The remote store is advisory: every call may fail and callers treat
//! failures as warnings, never as reasons to undo a local change.

mod memory;
mod sqlite;

pub use memory::*;
pub use sqlite::*;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::RecordFields;

/// Remote store errors.
#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("Remote store unavailable: {0}")]
    Unavailable(String),

    #[error("Remote store rejected request: {0}")]
    Rejected(String),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DbError),
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// A record as listed by the remote store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RemoteRecord {
    pub remote_id: String,
    pub fields: RecordFields,
    pub created_at: Option<String>,
}

/// Document-style store keyed by owner.
pub trait RemoteRecordStore {
    /// Store a record for `owner_id` and return the assigned identifier.
    fn create(&self, owner_id: &str, fields: &RecordFields) -> RemoteResult<String>;

    /// List every record stored for `owner_id`.
    fn list_by_owner(&self, owner_id: &str) -> RemoteResult<Vec<RemoteRecord>>;

    /// Delete a record by its remote identifier.
    fn delete_by_id(&self, remote_id: &str) -> RemoteResult<()>;
}

/// Store used when no remote backend is configured. Every call fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableStore;

impl RemoteRecordStore for UnavailableStore {
    fn create(&self, _owner_id: &str, _fields: &RecordFields) -> RemoteResult<String> {
        Err(RemoteError::Unavailable("no remote store configured".into()))
    }

    fn list_by_owner(&self, _owner_id: &str) -> RemoteResult<Vec<RemoteRecord>> {
        Err(RemoteError::Unavailable("no remote store configured".into()))
    }

    fn delete_by_id(&self, _remote_id: &str) -> RemoteResult<()> {
        Err(RemoteError::Unavailable("no remote store configured".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_store_fails_everything() {
        let store = UnavailableStore;
        let fields = RecordFields {
            age: 30,
            date: "2024-01-05".into(),
            disease: "Flu".into(),
            hospital: "City".into(),
            doctor: "Dr. A".into(),
            file_ref: None,
        };

        assert!(matches!(store.create("u1", &fields), Err(RemoteError::Unavailable(_))));
        assert!(store.list_by_owner("u1").is_err());
        assert!(store.delete_by_id("r1").is_err());
    }
}
