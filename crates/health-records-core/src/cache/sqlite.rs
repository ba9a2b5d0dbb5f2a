//! SQLite-backed cache.

use std::path::Path;

use tracing::warn;

use super::{
    decode_payload, decode_pending_deletes, encode_payload, encode_pending_deletes, CacheResult,
    LocalCache, DEFAULT_CACHE_KEY, PENDING_DELETES_SUFFIX,
};
use crate::db::{Database, DbResult};
use crate::models::RecordEntry;

/// Cache storing the record list under one key of the `kv_store` table, and
/// the pending remote deletes under a second key derived from it.
pub struct SqliteCache {
    db: Database,
    key: String,
    deletes_key: String,
}

impl SqliteCache {
    /// Open a cache file at path, creating it if needed.
    pub fn open<P: AsRef<Path>>(path: P, key: impl Into<String>) -> DbResult<Self> {
        Ok(Self::with_database(Database::open(path)?, key))
    }

    /// Create an in-memory cache (for testing).
    pub fn open_in_memory() -> DbResult<Self> {
        Ok(Self::with_database(
            Database::open_in_memory()?,
            DEFAULT_CACHE_KEY,
        ))
    }

    /// Wrap an already opened database.
    pub fn with_database(db: Database, key: impl Into<String>) -> Self {
        let key = key.into();
        let deletes_key = format!("{}{}", key, PENDING_DELETES_SUFFIX);
        Self {
            db,
            key,
            deletes_key,
        }
    }

    /// Key the record list is stored under.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Raw persisted payload, if any.
    pub fn load_raw(&self) -> DbResult<Option<String>> {
        self.db.get_kv(&self.key)
    }

    /// Replace the raw payload without validation.
    pub fn store_raw(&self, payload: &str) -> DbResult<()> {
        self.db.set_kv(&self.key, payload)
    }

    /// Drop the persisted list and pending deletes.
    pub fn clear(&self) -> DbResult<bool> {
        let deletes = self.db.delete_kv(&self.deletes_key)?;
        Ok(self.db.delete_kv(&self.key)? || deletes)
    }
}

impl LocalCache for SqliteCache {
    fn load(&self) -> Vec<RecordEntry> {
        match self.load_raw() {
            Ok(raw) => decode_payload(raw.as_deref()),
            Err(e) => {
                warn!(error = %e, key = %self.key, "Failed to read record cache");
                Vec::new()
            }
        }
    }

    fn save(&mut self, entries: &[RecordEntry]) -> CacheResult<()> {
        let payload = encode_payload(entries)?;
        self.store_raw(&payload)?;
        Ok(())
    }

    fn load_pending_deletes(&self) -> Vec<String> {
        match self.db.get_kv(&self.deletes_key) {
            Ok(raw) => decode_pending_deletes(raw.as_deref()),
            Err(e) => {
                warn!(error = %e, key = %self.deletes_key, "Failed to read pending deletes");
                Vec::new()
            }
        }
    }

    fn save_pending_deletes(&mut self, remote_ids: &[String]) -> CacheResult<()> {
        let payload = encode_pending_deletes(remote_ids)?;
        self.db.set_kv(&self.deletes_key, &payload)?;
        Ok(())
    }
}
