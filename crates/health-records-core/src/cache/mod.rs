//! Local persistent cache of the device's record list.
//!
//! The whole list lives under a single key as a JSON array. A payload that
//! fails to parse loads as an empty list.

mod memory;
mod sqlite;

pub use memory::*;
pub use sqlite::*;

use thiserror::Error;
use tracing::warn;

use crate::models::RecordEntry;

/// Default key holding the serialized record list.
pub const DEFAULT_CACHE_KEY: &str = "healthRecords";

/// Appended to the cache key to form the key of the pending remote deletes.
pub const PENDING_DELETES_SUFFIX: &str = ":pendingDeletes";

/// Cache errors.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Database error: {0}")]
    Database(#[from] crate::db::DbError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Cache unavailable: {0}")]
    Unavailable(String),
}

pub type CacheResult<T> = Result<T, CacheError>;

/// Durable storage for the current device's record list.
pub trait LocalCache {
    /// Last persisted list; empty if nothing was persisted or the payload is corrupt.
    fn load(&self) -> Vec<RecordEntry>;

    /// Overwrite the persisted list.
    fn save(&mut self, entries: &[RecordEntry]) -> CacheResult<()>;

    /// Remote ids deleted on this device whose remote delete is unconfirmed.
    fn load_pending_deletes(&self) -> Vec<String>;

    /// Overwrite the persisted pending remote deletes.
    fn save_pending_deletes(&mut self, remote_ids: &[String]) -> CacheResult<()>;
}

/// Serialize a record list into the persisted payload.
pub fn encode_payload(entries: &[RecordEntry]) -> CacheResult<String> {
    Ok(serde_json::to_string(entries)?)
}

/// Parse a persisted payload, treating corruption as an empty list.
pub fn decode_payload(raw: Option<&str>) -> Vec<RecordEntry> {
    let Some(raw) = raw else {
        return Vec::new();
    };
    match serde_json::from_str(raw) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(error = %e, "Cached record payload is corrupt, loading empty list");
            Vec::new()
        }
    }
}

/// Serialize pending remote delete ids.
pub fn encode_pending_deletes(remote_ids: &[String]) -> CacheResult<String> {
    Ok(serde_json::to_string(remote_ids)?)
}

/// Parse pending remote delete ids, treating corruption as none pending.
pub fn decode_pending_deletes(raw: Option<&str>) -> Vec<String> {
    let Some(raw) = raw else {
        return Vec::new();
    };
    serde_json::from_str(raw).unwrap_or_else(|e| {
        warn!(error = %e, "Pending delete payload is corrupt, ignoring it");
        Vec::new()
    })
}
