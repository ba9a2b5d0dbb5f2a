//! Relational record store.
//!
//! Implements the remote contract on top of the `records` table: one row per
//! record, autoincrement ids rendered as strings.

use std::path::Path;

use super::{RemoteError, RemoteRecord, RemoteRecordStore, RemoteResult};
use crate::db::{Database, DbResult, RecordRow};
use crate::models::RecordFields;

/// Record store backed by the relational `records` table.
pub struct SqliteRecordStore {
    db: Database,
}

impl SqliteRecordStore {
    /// Open a store at path, creating it if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        Ok(Self {
            db: Database::open(path)?,
        })
    }

    /// Create an in-memory store (for testing).
    pub fn open_in_memory() -> DbResult<Self> {
        Ok(Self {
            db: Database::open_in_memory()?,
        })
    }

    /// Replace every field of an existing record. Returns false if no row matched.
    pub fn update(&self, remote_id: &str, fields: &RecordFields) -> RemoteResult<bool> {
        let id = parse_id(remote_id)?;
        Ok(self.db.update_record_row(id, fields)?)
    }

    /// Get a single record by identifier.
    pub fn get(&self, remote_id: &str) -> RemoteResult<Option<RemoteRecord>> {
        let id = parse_id(remote_id)?;
        Ok(self.db.get_record_row(id)?.map(RemoteRecord::from))
    }
}

fn parse_id(remote_id: &str) -> RemoteResult<i64> {
    remote_id
        .parse::<i64>()
        .map_err(|_| RemoteError::Rejected(format!("invalid record id: {}", remote_id)))
}

impl From<RecordRow> for RemoteRecord {
    fn from(row: RecordRow) -> Self {
        Self {
            remote_id: row.id.to_string(),
            fields: row.fields(),
            created_at: Some(row.created_at),
        }
    }
}

impl RemoteRecordStore for SqliteRecordStore {
    fn create(&self, owner_id: &str, fields: &RecordFields) -> RemoteResult<String> {
        if owner_id.trim().is_empty() {
            return Err(RemoteError::Rejected("owner id is required".into()));
        }
        let id = self.db.insert_record_row(owner_id, fields)?;
        Ok(id.to_string())
    }

    fn list_by_owner(&self, owner_id: &str) -> RemoteResult<Vec<RemoteRecord>> {
        Ok(self
            .db
            .list_record_rows(owner_id)?
            .into_iter()
            .map(RemoteRecord::from)
            .collect())
    }

    fn delete_by_id(&self, remote_id: &str) -> RemoteResult<()> {
        let id = parse_id(remote_id)?;
        self.db.delete_record_row(id)?;
        Ok(())
    }
}
