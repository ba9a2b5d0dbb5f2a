//! In-memory record list with write-through to the local cache.

use std::collections::HashSet;

use tracing::{debug, warn};

use super::{Promotion, SyncStats};
use crate::cache::LocalCache;
use crate::models::{IdKind, NewRecord, RecordEntry, SyncState, ValidationError};
use crate::remote::{RemoteRecord, RemoteResult};

/// Owner of the device's record list.
///
/// Every mutation is persisted to the cache before the method returns. A
/// failed save is logged and the in-memory list keeps the change.
///
/// Removed remote ids stay queued for a remote delete, across restarts, until
/// the delete is confirmed. A queued id is never merged back in.
pub struct RecordLedger<C: LocalCache> {
    cache: C,
    entries: Vec<RecordEntry>,
    tombstones: HashSet<String>,
    pending_deletes: Vec<String>,
}

impl<C: LocalCache> RecordLedger<C> {
    /// Load the persisted list from the cache.
    pub fn open(cache: C) -> Self {
        let mut seen = HashSet::new();
        let mut entries = cache.load();
        let loaded = entries.len();
        entries.retain(|e| seen.insert(e.id.clone()));
        if entries.len() != loaded {
            warn!(
                dropped = loaded - entries.len(),
                "Dropped cached records with duplicate ids"
            );
        }

        let mut pending_deletes = cache.load_pending_deletes();
        let mut queued = HashSet::new();
        pending_deletes.retain(|id| queued.insert(id.clone()));

        // A queued id may still sit in the list if the previous save failed
        entries.retain(|e| !queued.contains(&e.id));

        debug!(
            count = entries.len(),
            pending_deletes = pending_deletes.len(),
            "Opened record ledger"
        );
        Self {
            cache,
            entries,
            tombstones: queued,
            pending_deletes,
        }
    }

    /// Current entries, in insertion order.
    pub fn entries(&self) -> &[RecordEntry] {
        &self.entries
    }

    /// Get an entry by id.
    pub fn get(&self, id: &str) -> Option<&RecordEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// The underlying cache.
    pub fn cache(&self) -> &C {
        &self.cache
    }

    /// Whether `id` was deleted locally and must not come back.
    pub fn is_tombstoned(&self, id: &str) -> bool {
        self.tombstones.contains(id)
    }

    /// Remote ids whose remote delete has not been confirmed, oldest first.
    pub fn pending_deletes(&self) -> &[String] {
        &self.pending_deletes
    }

    /// Validate a form and append a new local entry.
    ///
    /// The entry is `Pending` when an owner is given, `Failed` (local-only) otherwise.
    pub fn stage(
        &mut self,
        form: &NewRecord,
        owner_id: Option<&str>,
    ) -> Result<RecordEntry, ValidationError> {
        let fields = form.validate()?;
        let entry = RecordEntry::new_local(fields, owner_id.map(str::to_string));

        debug!(id = %entry.id, state = ?entry.sync_state, "Staged record");
        self.entries.push(entry.clone());
        self.persist();
        Ok(entry)
    }

    /// Apply the outcome of a remote create for a staged entry.
    ///
    /// Never resurrects an entry that was deleted while the create was in flight.
    pub fn apply_remote_create(&mut self, local_id: &str, result: RemoteResult<String>) -> Promotion {
        let position = self
            .entries
            .iter()
            .position(|e| e.id == local_id && e.id_kind() == IdKind::Local);

        let Some(index) = position else {
            let remote_id = result.ok();
            debug!(
                %local_id,
                tombstoned = self.is_tombstoned(local_id),
                "Ignoring remote create for missing record"
            );
            if let Some(remote_id) = &remote_id {
                self.queue_remote_delete(remote_id);
            }
            return Promotion::Stale { remote_id };
        };

        match result {
            Ok(remote_id) => {
                if self.entries.iter().any(|e| e.id == remote_id) {
                    self.entries.remove(index);
                    self.persist();
                    return Promotion::AlreadyPresent { remote_id };
                }

                let entry = &mut self.entries[index];
                entry.id = remote_id;
                entry.sync_state = SyncState::Synced;
                let promoted = entry.clone();

                debug!(%local_id, remote_id = %promoted.id, "Promoted record");
                self.persist();
                Promotion::Promoted(promoted)
            }
            Err(e) => {
                let entry = &mut self.entries[index];
                entry.sync_state = SyncState::Failed;
                let failed = entry.clone();

                self.persist();
                Promotion::MarkedFailed {
                    entry: failed,
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Move a failed local entry back to `Pending` for a retry, assigning
    /// `owner_id` if the entry has no owner yet.
    pub fn mark_pending(&mut self, id: &str, owner_id: &str) -> Option<RecordEntry> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.id == id && e.sync_state == SyncState::Failed)?;

        if entry.owner_id.is_none() {
            entry.owner_id = Some(owner_id.to_string());
        }
        entry.sync_state = SyncState::Pending;
        let pending = entry.clone();

        self.persist();
        Some(pending)
    }

    /// Remove an entry unconditionally and remember its id. A synced entry
    /// is queued for a remote delete.
    pub fn remove(&mut self, id: &str) -> Option<RecordEntry> {
        let index = self.entries.iter().position(|e| e.id == id)?;
        let removed = self.entries.remove(index);
        self.tombstones.insert(removed.id.clone());

        debug!(%id, state = ?removed.sync_state, "Removed record");
        if removed.is_synced() {
            self.queue_remote_delete(&removed.id);
        }
        self.persist();
        Some(removed)
    }

    /// Queue a remote id for deletion from the remote store.
    pub fn queue_remote_delete(&mut self, remote_id: &str) {
        self.tombstones.insert(remote_id.to_string());
        if self.pending_deletes.iter().any(|id| id == remote_id) {
            return;
        }
        self.pending_deletes.push(remote_id.to_string());
        self.persist_deletes();
    }

    /// Record that the remote store no longer holds `remote_id`.
    ///
    /// Returns false if the id was not queued.
    pub fn confirm_remote_delete(&mut self, remote_id: &str) -> bool {
        let Some(index) = self.pending_deletes.iter().position(|id| id == remote_id) else {
            return false;
        };
        self.pending_deletes.remove(index);
        self.tombstones.remove(remote_id);

        debug!(%remote_id, "Remote delete confirmed");
        self.persist_deletes();
        true
    }

    /// Add remote records not yet present locally. Returns how many were added.
    pub fn merge_remote(&mut self, owner_id: &str, records: Vec<RemoteRecord>) -> usize {
        let mut merged = 0;
        for record in records {
            if self.is_tombstoned(&record.remote_id) || self.get(&record.remote_id).is_some() {
                continue;
            }
            self.entries.push(RecordEntry::from_remote(
                record.remote_id,
                owner_id,
                record.fields,
                record.created_at,
            ));
            merged += 1;
        }

        if merged > 0 {
            self.persist();
        }
        merged
    }

    /// Counts of entries by sync state.
    pub fn stats(&self) -> SyncStats {
        let mut stats = SyncStats {
            total: self.entries.len() as u32,
            ..SyncStats::default()
        };
        for entry in &self.entries {
            match entry.sync_state {
                SyncState::Pending => stats.pending += 1,
                SyncState::Synced => stats.synced += 1,
                SyncState::Failed => stats.failed += 1,
            }
        }
        stats
    }

    /// Check if any entry or delete is not mirrored remotely.
    pub fn has_unsynced_changes(&self) -> bool {
        !self.pending_deletes.is_empty() || self.entries.iter().any(|e| !e.is_synced())
    }

    fn persist(&mut self) {
        if let Err(e) = self.cache.save(&self.entries) {
            warn!(error = %e, count = self.entries.len(), "Failed to persist record cache");
        }
    }

    fn persist_deletes(&mut self) {
        if let Err(e) = self.cache.save_pending_deletes(&self.pending_deletes) {
            warn!(error = %e, count = self.pending_deletes.len(), "Failed to persist pending deletes");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheError, CacheResult, MemoryCache};
    use crate::models::RecordFields;
    use crate::remote::RemoteError;

    fn flu() -> NewRecord {
        NewRecord::new("30", "2024-01-05", "Flu", "City", "Dr. A")
    }

    fn setup() -> RecordLedger<MemoryCache> {
        RecordLedger::open(MemoryCache::new())
    }

    /// Cache whose saves always fail.
    struct BrokenCache;

    impl LocalCache for BrokenCache {
        fn load(&self) -> Vec<RecordEntry> {
            Vec::new()
        }

        fn save(&mut self, _entries: &[RecordEntry]) -> CacheResult<()> {
            Err(CacheError::Unavailable("disk full".into()))
        }

        fn load_pending_deletes(&self) -> Vec<String> {
            Vec::new()
        }

        fn save_pending_deletes(&mut self, _remote_ids: &[String]) -> CacheResult<()> {
            Err(CacheError::Unavailable("disk full".into()))
        }
    }

    #[test]
    fn test_stage_writes_through() {
        let mut ledger = setup();
        let entry = ledger.stage(&flu(), Some("u1")).unwrap();

        assert_eq!(entry.sync_state, SyncState::Pending);
        assert_eq!(ledger.entries(), ledger.cache().load().as_slice());
    }

    #[test]
    fn test_stage_invalid_leaves_state_untouched() {
        let mut ledger = setup();
        let mut form = flu();
        form.date = None;

        assert!(ledger.stage(&form, Some("u1")).is_err());
        assert!(ledger.entries().is_empty());
        assert_eq!(ledger.cache().raw(), None);
    }

    #[test]
    fn test_promotion_replaces_id() {
        let mut ledger = setup();
        let entry = ledger.stage(&flu(), Some("u1")).unwrap();

        let promotion = ledger.apply_remote_create(&entry.id, Ok("r42".into()));
        assert!(matches!(promotion, Promotion::Promoted(ref e) if e.id == "r42"));

        assert!(ledger.get(&entry.id).is_none());
        let promoted = ledger.get("r42").unwrap();
        assert_eq!(promoted.sync_state, SyncState::Synced);
        assert_eq!(promoted.id_kind(), IdKind::Remote);
        assert_eq!(promoted.created_at, entry.created_at);
        assert_eq!(ledger.cache().load(), ledger.entries());
    }

    #[test]
    fn test_failed_create_marks_failed() {
        let mut ledger = setup();
        let entry = ledger.stage(&flu(), Some("u1")).unwrap();

        let promotion = ledger.apply_remote_create(
            &entry.id,
            Err(RemoteError::Unavailable("offline".into())),
        );
        assert!(matches!(promotion, Promotion::MarkedFailed { .. }));
        assert_eq!(ledger.get(&entry.id).unwrap().sync_state, SyncState::Failed);
        assert_eq!(ledger.cache().load()[0].sync_state, SyncState::Failed);
    }

    #[test]
    fn test_late_promotion_after_delete_is_stale() {
        let mut ledger = setup();
        let entry = ledger.stage(&flu(), Some("u1")).unwrap();

        ledger.remove(&entry.id).unwrap();
        assert!(ledger.is_tombstoned(&entry.id));

        let promotion = ledger.apply_remote_create(&entry.id, Ok("r9".into()));
        assert_eq!(
            promotion,
            Promotion::Stale {
                remote_id: Some("r9".into())
            }
        );
        assert!(ledger.entries().is_empty());
        assert!(ledger.cache().load().is_empty());
    }

    #[test]
    fn test_promotion_onto_existing_remote_id() {
        let mut ledger = setup();
        let entry = ledger.stage(&flu(), Some("u1")).unwrap();

        let fields = entry.fields();
        ledger.merge_remote(
            "u1",
            vec![RemoteRecord {
                remote_id: "r5".into(),
                fields,
                created_at: None,
            }],
        );

        let promotion = ledger.apply_remote_create(&entry.id, Ok("r5".into()));
        assert_eq!(
            promotion,
            Promotion::AlreadyPresent {
                remote_id: "r5".into()
            }
        );
        assert_eq!(ledger.entries().len(), 1);
        assert_eq!(ledger.entries()[0].id, "r5");
    }

    #[test]
    fn test_remove_unknown_id() {
        let mut ledger = setup();
        ledger.stage(&flu(), None).unwrap();

        assert!(ledger.remove("missing").is_none());
        assert_eq!(ledger.entries().len(), 1);
    }

    #[test]
    fn test_mark_pending_claims_owner() {
        let mut ledger = setup();
        let entry = ledger.stage(&flu(), None).unwrap();

        let pending = ledger.mark_pending(&entry.id, "u1").unwrap();
        assert_eq!(pending.sync_state, SyncState::Pending);
        assert_eq!(pending.owner_id, Some("u1".into()));

        // Only failed entries can be retried
        assert!(ledger.mark_pending(&entry.id, "u1").is_none());
    }

    #[test]
    fn test_merge_skips_known_and_tombstoned() {
        let mut ledger = setup();
        let fields = RecordFields {
            age: 40,
            date: "2024-03-01".into(),
            disease: "Migraine".into(),
            hospital: "North".into(),
            doctor: "Dr. B".into(),
            file_ref: None,
        };
        let remote = |id: &str| RemoteRecord {
            remote_id: id.into(),
            fields: fields.clone(),
            created_at: Some("2024-03-01T09:00:00Z".into()),
        };

        assert_eq!(ledger.merge_remote("u1", vec![remote("r1"), remote("r2")]), 2);
        ledger.remove("r2").unwrap();

        assert_eq!(
            ledger.merge_remote("u1", vec![remote("r1"), remote("r2"), remote("r3")]),
            1
        );
        let ids: Vec<_> = ledger.entries().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["r1", "r3"]);
        assert!(ledger.entries().iter().all(|e| e.is_synced()));
    }

    #[test]
    fn test_open_drops_duplicate_ids() {
        let entry = RecordEntry::new_local(flu().validate().unwrap(), None);
        let mut cache = MemoryCache::new();
        cache.save(&[entry.clone(), entry.clone()]).unwrap();

        let ledger = RecordLedger::open(cache);
        assert_eq!(ledger.entries(), &[entry]);
    }

    #[test]
    fn test_save_failure_keeps_memory_state() {
        let mut ledger = RecordLedger::open(BrokenCache);

        let entry = ledger.stage(&flu(), None).unwrap();
        assert_eq!(ledger.entries().len(), 1);

        ledger.remove(&entry.id).unwrap();
        assert!(ledger.entries().is_empty());
    }

    #[test]
    fn test_remove_synced_queues_remote_delete() {
        let mut ledger = setup();
        let synced = ledger.stage(&flu(), Some("u1")).unwrap();
        ledger.apply_remote_create(&synced.id, Ok("r1".into()));
        let local = ledger.stage(&flu(), None).unwrap();

        ledger.remove("r1").unwrap();
        ledger.remove(&local.id).unwrap();

        assert_eq!(ledger.pending_deletes(), &["r1".to_string()]);
        assert_eq!(ledger.cache().load_pending_deletes(), vec!["r1".to_string()]);
        assert!(ledger.has_unsynced_changes());
    }

    #[test]
    fn test_pending_deletes_block_merge_after_reopen() {
        let mut ledger = setup();
        let entry = ledger.stage(&flu(), Some("u1")).unwrap();
        ledger.apply_remote_create(&entry.id, Ok("r1".into()));
        ledger.remove("r1").unwrap();

        let mut reopened = RecordLedger::open(ledger.cache().clone());
        assert!(reopened.is_tombstoned("r1"));

        let listed = RemoteRecord {
            remote_id: "r1".into(),
            fields: entry.fields(),
            created_at: None,
        };
        assert_eq!(reopened.merge_remote("u1", vec![listed]), 0);
        assert!(reopened.entries().is_empty());
    }

    #[test]
    fn test_confirm_prunes_tombstone() {
        let mut ledger = setup();
        let entry = ledger.stage(&flu(), Some("u1")).unwrap();
        ledger.apply_remote_create(&entry.id, Ok("r1".into()));
        ledger.remove("r1").unwrap();

        assert!(ledger.confirm_remote_delete("r1"));
        assert!(!ledger.is_tombstoned("r1"));
        assert!(ledger.pending_deletes().is_empty());
        assert!(ledger.cache().load_pending_deletes().is_empty());
        assert!(!ledger.confirm_remote_delete("r1"));
    }

    #[test]
    fn test_stale_create_queues_orphan() {
        let mut ledger = setup();
        let entry = ledger.stage(&flu(), Some("u1")).unwrap();
        ledger.remove(&entry.id).unwrap();
        assert!(ledger.pending_deletes().is_empty());

        ledger.apply_remote_create(&entry.id, Ok("r9".into()));
        assert_eq!(ledger.pending_deletes(), &["r9".to_string()]);
    }

    #[test]
    fn test_open_drops_entries_queued_for_delete() {
        let entry = RecordEntry::from_remote("r1".into(), "u1", flu().validate().unwrap(), None);
        let mut cache = MemoryCache::new();
        cache.save(&[entry]).unwrap();
        cache.save_pending_deletes(&["r1".to_string()]).unwrap();

        let ledger = RecordLedger::open(cache);
        assert!(ledger.entries().is_empty());
        assert_eq!(ledger.pending_deletes(), &["r1".to_string()]);
    }

    #[test]
    fn test_stats() {
        let mut ledger = setup();
        let a = ledger.stage(&flu(), Some("u1")).unwrap();
        let b = ledger.stage(&flu(), Some("u1")).unwrap();
        ledger.stage(&flu(), None).unwrap();
        ledger.apply_remote_create(&a.id, Ok("r1".into()));
        assert!(ledger.has_unsynced_changes());

        let stats = ledger.stats();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.synced, 1);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.failed, 1);

        ledger.remove(&b.id);
        assert_eq!(ledger.stats().pending, 0);
    }
}
