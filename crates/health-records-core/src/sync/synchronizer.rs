//! Record synchronizer: local-first mutations with advisory remote mirroring.

use std::sync::Arc;

use tracing::{debug, warn};

use super::{
    AddOutcome, DeleteOutcome, Promotion, RecordLedger, RefreshOutcome, ResyncReport, SyncNotice,
    SyncStats,
};
use crate::cache::LocalCache;
use crate::identity::IdentityProvider;
use crate::models::{NewRecord, RecordEntry, SyncState, ValidationError};
use crate::remote::{RemoteRecordStore, RemoteResult};

/// Keeps the local list and cache authoritative while mirroring to a remote store.
pub struct RecordSynchronizer<C: LocalCache, R: RemoteRecordStore> {
    ledger: RecordLedger<C>,
    remote: R,
    identity: Arc<dyn IdentityProvider>,
}

impl<C: LocalCache, R: RemoteRecordStore> RecordSynchronizer<C, R> {
    /// Create a synchronizer, loading the persisted list from `cache`.
    pub fn new(cache: C, remote: R, identity: Arc<dyn IdentityProvider>) -> Self {
        Self {
            ledger: RecordLedger::open(cache),
            remote,
            identity,
        }
    }

    /// Current entries, in insertion order.
    pub fn records(&self) -> &[RecordEntry] {
        self.ledger.entries()
    }

    /// The underlying ledger.
    pub fn ledger(&self) -> &RecordLedger<C> {
        &self.ledger
    }

    /// The remote store.
    pub fn remote(&self) -> &R {
        &self.remote
    }

    /// Add a record locally, then mirror it if a session is present.
    ///
    /// Only validation can fail. Remote failures are reported in the notice.
    pub fn add_record(&mut self, form: &NewRecord) -> Result<AddOutcome, ValidationError> {
        let owner_id = self.identity.current_user_id();
        let entry = self.ledger.stage(form, owner_id.as_deref())?;

        let Some(owner_id) = owner_id else {
            return Ok(AddOutcome {
                record: entry,
                notice: SyncNotice::SavedLocally,
            });
        };

        let result = self.remote.create(&owner_id, &entry.fields());
        let outcome = match self.complete_remote_create(&entry.id, result) {
            Promotion::Promoted(record) => AddOutcome {
                record,
                notice: SyncNotice::Synced,
            },
            Promotion::MarkedFailed { entry, reason } => AddOutcome {
                record: entry,
                notice: SyncNotice::SyncFailed(reason),
            },
            Promotion::AlreadyPresent { remote_id } => {
                let record = self.ledger.get(&remote_id).cloned().unwrap_or(entry);
                AddOutcome {
                    record,
                    notice: SyncNotice::Synced,
                }
            }
            Promotion::Stale { .. } => AddOutcome {
                record: entry,
                notice: SyncNotice::SavedLocally,
            },
        };
        Ok(outcome)
    }

    /// Apply a remote create result that may arrive after the entry changed.
    ///
    /// A success for an entry deleted in the meantime is not applied; the
    /// orphaned remote record is deleted instead, or stays queued if that fails.
    pub fn complete_remote_create(&mut self, local_id: &str, result: RemoteResult<String>) -> Promotion {
        let promotion = self.ledger.apply_remote_create(local_id, result);

        match &promotion {
            Promotion::Stale {
                remote_id: Some(remote_id),
            } => {
                debug!(%local_id, %remote_id, "Deleting remote copy of removed record");
                if let Err(e) = self.push_remote_delete(remote_id) {
                    warn!(error = %e, %remote_id, "Compensating remote delete failed");
                }
            }
            Promotion::MarkedFailed { reason, .. } => {
                warn!(%local_id, %reason, "Record saved locally, remote create failed");
            }
            _ => {}
        }
        promotion
    }

    /// Delete a record locally, then remotely if it was synced and a session is present.
    ///
    /// A synced record whose remote delete fails or is not attempted stays
    /// queued and is retried by [`Self::resync_failed`].
    pub fn delete_record(&mut self, id: &str) -> DeleteOutcome {
        let Some(removed) = self.ledger.remove(id) else {
            return DeleteOutcome {
                removed: None,
                notice: SyncNotice::DeletedLocally,
            };
        };

        if removed.sync_state != SyncState::Synced || self.identity.current_user_id().is_none() {
            return DeleteOutcome {
                removed: Some(removed),
                notice: SyncNotice::DeletedLocally,
            };
        }

        let notice = match self.push_remote_delete(&removed.id) {
            Ok(()) => SyncNotice::Deleted,
            Err(e) => {
                warn!(error = %e, id = %removed.id, "Record deleted locally, remote delete failed");
                SyncNotice::DeleteFailed(e.to_string())
            }
        };
        DeleteOutcome {
            removed: Some(removed),
            notice,
        }
    }

    /// Retry queued remote deletes, then the remote create for every failed
    /// entry the session may own.
    ///
    /// Entries without an owner are claimed by the signed-in user.
    pub fn resync_failed(&mut self) -> ResyncReport {
        let mut report = ResyncReport::default();
        let Some(owner_id) = self.identity.current_user_id() else {
            return report;
        };

        for remote_id in self.ledger.pending_deletes().to_vec() {
            report.deletes_attempted += 1;
            match self.push_remote_delete(&remote_id) {
                Ok(()) => report.deleted += 1,
                Err(e) => warn!(error = %e, %remote_id, "Queued remote delete failed again"),
            }
        }

        let candidates: Vec<String> = self
            .ledger
            .entries()
            .iter()
            .filter(|e| e.sync_state == SyncState::Failed)
            .filter(|e| e.owner_id.as_deref().map_or(true, |o| o == owner_id))
            .map(|e| e.id.clone())
            .collect();

        for id in candidates {
            let Some(entry) = self.ledger.mark_pending(&id, &owner_id) else {
                continue;
            };
            report.attempted += 1;

            let result = self.remote.create(&owner_id, &entry.fields());
            match self.complete_remote_create(&id, result) {
                Promotion::Promoted(_) | Promotion::AlreadyPresent { .. } => report.promoted += 1,
                Promotion::MarkedFailed { .. } | Promotion::Stale { .. } => report.failed += 1,
            }
        }

        debug!(
            attempted = report.attempted,
            promoted = report.promoted,
            deleted = report.deleted,
            "Resync finished"
        );
        report
    }

    /// Merge the session owner's remote records into the local list.
    pub fn refresh_from_remote(&mut self) -> RefreshOutcome {
        let Some(owner_id) = self.identity.current_user_id() else {
            return RefreshOutcome {
                merged: 0,
                notice: SyncNotice::NoSession,
            };
        };

        match self.remote.list_by_owner(&owner_id) {
            Ok(records) => RefreshOutcome {
                merged: self.ledger.merge_remote(&owner_id, records),
                notice: SyncNotice::Refreshed,
            },
            Err(e) => {
                warn!(error = %e, "Failed to list remote records");
                RefreshOutcome {
                    merged: 0,
                    notice: SyncNotice::RefreshFailed(e.to_string()),
                }
            }
        }
    }

    fn push_remote_delete(&mut self, remote_id: &str) -> RemoteResult<()> {
        self.remote.delete_by_id(remote_id)?;
        self.ledger.confirm_remote_delete(remote_id);
        Ok(())
    }

    /// Counts of entries by sync state.
    pub fn stats(&self) -> SyncStats {
        self.ledger.stats()
    }

    /// Check if any entry is not mirrored remotely.
    pub fn has_unsynced_changes(&self) -> bool {
        self.ledger.has_unsynced_changes()
    }
}
