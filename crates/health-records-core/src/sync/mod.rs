//! Offline-first record synchronization.
//!
//! Local changes are applied to the in-memory list and written through to the
//! cache immediately. The remote store is mirrored afterwards, best-effort;
//! its failures become [`SyncNotice`] warnings and never undo a local change.
//!
//! Entry lifecycle:
//!
//! ```text
//!   stage ──► Pending ──create ok──► Synced
//!      │         │
//!  no session    └──create failed──► Failed ──resync──► Pending
//!      │
//!      └──────────────────────────► Failed
//! ```
//!
//! Deletion is terminal from any state and leaves a tombstone so a late
//! remote acknowledgement cannot bring the entry back. Deleting a synced
//! entry also queues its remote id in the cache until the remote store
//! confirms the delete, so a refresh after a restart cannot restore it.

mod ledger;
mod synchronizer;

pub use ledger::*;
pub use synchronizer::*;

use serde::{Deserialize, Serialize};

use crate::models::RecordEntry;

/// Advisory notification produced by a sync operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncNotice {
    /// Stored on this device only; no session
    SavedLocally,
    /// Stored locally and mirrored remotely
    Synced,
    /// Stored locally, remote create failed
    SyncFailed(String),
    /// Removed locally; nothing remote to remove
    DeletedLocally,
    /// Removed locally and remotely
    Deleted,
    /// Removed locally, remote delete failed
    DeleteFailed(String),
    /// Remote listing merged into the local list
    Refreshed,
    /// Remote listing failed
    RefreshFailed(String),
    /// Operation needs a session and there is none
    NoSession,
}

impl SyncNotice {
    /// Whether the notice should be shown as a warning.
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            SyncNotice::SyncFailed(_) | SyncNotice::DeleteFailed(_) | SyncNotice::RefreshFailed(_)
        )
    }

    /// User-facing message.
    pub fn message(&self) -> String {
        match self {
            SyncNotice::SavedLocally => "Record saved locally".into(),
            SyncNotice::Synced => "Record added successfully".into(),
            SyncNotice::SyncFailed(_) => {
                "Record saved locally, but failed to sync with cloud".into()
            }
            SyncNotice::DeletedLocally => "Record deleted locally".into(),
            SyncNotice::Deleted => "Record deleted successfully".into(),
            SyncNotice::DeleteFailed(_) => {
                "Record deleted locally, but failed to sync with cloud".into()
            }
            SyncNotice::Refreshed => "Records refreshed".into(),
            SyncNotice::RefreshFailed(_) => "Failed to load records from cloud".into(),
            SyncNotice::NoSession => "Sign in to sync records".into(),
        }
    }
}

/// Result of adding a record.
#[derive(Debug, Clone, PartialEq)]
pub struct AddOutcome {
    /// The entry as it stands after the remote attempt
    pub record: RecordEntry,
    pub notice: SyncNotice,
}

/// Result of deleting a record.
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteOutcome {
    /// The removed entry, or None if no entry had the id
    pub removed: Option<RecordEntry>,
    pub notice: SyncNotice,
}

/// Result of applying a remote create outcome to the ledger.
#[derive(Debug, Clone, PartialEq)]
pub enum Promotion {
    /// Local id replaced by the remote id
    Promoted(RecordEntry),
    /// The remote id is already in the list; the local duplicate was dropped
    AlreadyPresent { remote_id: String },
    /// Remote create failed; entry kept and marked failed
    MarkedFailed { entry: RecordEntry, reason: String },
    /// Target entry was deleted or never existed; nothing applied
    Stale { remote_id: Option<String> },
}

/// Result of an explicit retry pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResyncReport {
    /// Failed entries retried
    pub attempted: usize,
    pub promoted: usize,
    pub failed: usize,
    /// Queued remote deletes retried
    pub deletes_attempted: usize,
    pub deleted: usize,
}

/// Result of pulling the owner's records from the remote store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshOutcome {
    /// Remote entries newly added to the local list
    pub merged: usize,
    pub notice: SyncNotice,
}

/// Counts of entries by sync state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStats {
    pub total: u32,
    pub pending: u32,
    pub synced: u32,
    pub failed: u32,
}
