//! In-memory cache for ephemeral sessions and tests.

use super::{
    decode_payload, decode_pending_deletes, encode_payload, encode_pending_deletes, CacheResult,
    LocalCache,
};
use crate::models::RecordEntry;

/// Cache that keeps the serialized payload in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryCache {
    payload: Option<String>,
    pending_deletes: Option<String>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw persisted payload, if any.
    pub fn raw(&self) -> Option<&str> {
        self.payload.as_deref()
    }

    /// Replace the raw payload without validation.
    pub fn set_raw(&mut self, payload: impl Into<String>) {
        self.payload = Some(payload.into());
    }
}

impl LocalCache for MemoryCache {
    fn load(&self) -> Vec<RecordEntry> {
        decode_payload(self.payload.as_deref())
    }

    fn save(&mut self, entries: &[RecordEntry]) -> CacheResult<()> {
        self.payload = Some(encode_payload(entries)?);
        Ok(())
    }

    fn load_pending_deletes(&self) -> Vec<String> {
        decode_pending_deletes(self.pending_deletes.as_deref())
    }

    fn save_pending_deletes(&mut self, remote_ids: &[String]) -> CacheResult<()> {
        self.pending_deletes = Some(encode_pending_deletes(remote_ids)?);
        Ok(())
    }
}
