//! Health Records Core Library
//!
//! Local-first store for personal medical records with advisory remote mirroring.
//!
//! # Architecture
//!
//! ```text
//!          Record form (host UI)
//!                  │
//!              validate ──✗──► ValidationError (nothing changed)
//!                  │
//!     ┌────────────▼────────────┐
//!     │   RecordLedger          │   in-memory list
//!     │   append + write-through├──────────────► LocalCache (SQLite kv)
//!     └────────────┬────────────┘
//!                  │  session present?
//!                  ▼
//!          RemoteRecordStore::create ──✗──► Failed + warning notice
//!                  │
//!          promote local id → remote id (unless tombstoned)
//!                  │
//!                  ▼
//!      Query view: filter → date range → sort → paginate
//! ```
//!
//! # Core Principle
//!
//! **Local changes are authoritative.** A remote failure never blocks or
//! reverses an add or a delete on this device.
//!
//! # Modules
//!
//! - [`db`]: SQLite database layer (kv cache table, relational records table)
//! - [`models`]: Domain types (RecordEntry, NewRecord, SyncState)
//! - [`cache`]: Local cache of the record list
//! - [`remote`]: Remote record store adapter and implementations
//! - [`identity`]: Identity provider adapter
//! - [`sync`]: Record ledger and synchronizer
//! - [`query`]: Filter, sort, paginate
//! - [`export`]: JSON export and share payload
//! - [`config`]: Core configuration

pub mod cache;
pub mod config;
pub mod db;
pub mod export;
pub mod identity;
pub mod models;
pub mod query;
pub mod remote;
pub mod sync;

// Re-export commonly used types
pub use cache::{LocalCache, MemoryCache, SqliteCache};
pub use config::CoreConfig;
pub use db::Database;
pub use identity::{IdentityProvider, SessionHandle};
pub use models::{IdKind, NewRecord, RecordEntry, RecordFields, SyncState, ValidationError};
pub use query::{Column, Direction, QueryPage, RecordQuery, SearchColumn};
pub use remote::{RemoteError, RemoteRecord, RemoteRecordStore, SqliteRecordStore};
pub use sync::{Promotion, RecordLedger, RecordSynchronizer, SyncNotice, SyncStats};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::{Arc, Mutex};

use tracing_subscriber::EnvFilter;

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum HealthRecordsError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<db::DbError> for HealthRecordsError {
    fn from(e: db::DbError) -> Self {
        HealthRecordsError::DatabaseError(e.to_string())
    }
}

impl From<ValidationError> for HealthRecordsError {
    fn from(e: ValidationError) -> Self {
        HealthRecordsError::InvalidInput(e.to_string())
    }
}

impl From<query::QueryError> for HealthRecordsError {
    fn from(e: query::QueryError) -> Self {
        HealthRecordsError::InvalidInput(e.to_string())
    }
}

impl From<export::ExportError> for HealthRecordsError {
    fn from(e: export::ExportError) -> Self {
        HealthRecordsError::SerializationError(e.to_string())
    }
}

impl From<config::ConfigError> for HealthRecordsError {
    fn from(e: config::ConfigError) -> Self {
        HealthRecordsError::ConfigError(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for HealthRecordsError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        HealthRecordsError::DatabaseError(format!("Lock poisoned: {}", e))
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Install a global tracing subscriber. Later calls are ignored.
#[uniffi::export]
pub fn init_logging(level: String) {
    let filter = EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Open or create a record store at the given path.
#[uniffi::export]
pub fn open_records(path: String) -> Result<Arc<HealthRecordsCore>, HealthRecordsError> {
    let cache = SqliteCache::open(&path, cache::DEFAULT_CACHE_KEY)?;
    Ok(HealthRecordsCore::from_cache(cache, query::DEFAULT_PAGE_SIZE))
}

/// Open a record store as described by a JSON config file (defaults if missing),
/// installing logging at the configured level.
#[uniffi::export]
pub fn open_records_with_config(
    config_path: String,
) -> Result<Arc<HealthRecordsCore>, HealthRecordsError> {
    let config = CoreConfig::load_or_default(&config_path);
    init_logging(config.log_level.clone());
    let cache = SqliteCache::open(&config.database_path, config.cache_key.clone())?;
    Ok(HealthRecordsCore::from_cache(cache, config.page_size))
}

/// Create an in-memory record store (for testing).
#[uniffi::export]
pub fn open_records_in_memory() -> Result<Arc<HealthRecordsCore>, HealthRecordsError> {
    let cache = SqliteCache::open_in_memory()?;
    Ok(HealthRecordsCore::from_cache(cache, query::DEFAULT_PAGE_SIZE))
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe record ledger for FFI.
///
/// The host performs remote calls itself and reports their outcome, so a
/// network response for a record deleted in the meantime is reported back as
/// stale instead of being applied.
#[derive(uniffi::Object)]
pub struct HealthRecordsCore {
    ledger: Mutex<RecordLedger<SqliteCache>>,
    page_size: usize,
}

impl HealthRecordsCore {
    fn from_cache(cache: SqliteCache, page_size: usize) -> Arc<Self> {
        Arc::new(Self {
            ledger: Mutex::new(RecordLedger::open(cache)),
            page_size,
        })
    }
}

#[uniffi::export]
impl HealthRecordsCore {
    // =========================================================================
    // Record Operations
    // =========================================================================

    /// All records, in insertion order.
    pub fn list_records(&self) -> Result<Vec<FfiRecord>, HealthRecordsError> {
        let ledger = self.ledger.lock()?;
        Ok(ledger.entries().iter().cloned().map(Into::into).collect())
    }

    /// Add a record locally. With an owner the record is pending until the
    /// host reports the remote create outcome.
    pub fn add_record(
        &self,
        form: FfiNewRecord,
        owner_id: Option<String>,
    ) -> Result<FfiRecord, HealthRecordsError> {
        let mut ledger = self.ledger.lock()?;
        let entry = ledger.stage(&form.into(), owner_id.as_deref())?;
        Ok(entry.into())
    }

    /// Report that the remote store accepted a record.
    pub fn confirm_remote_create(
        &self,
        local_id: String,
        remote_id: String,
    ) -> Result<FfiPromotion, HealthRecordsError> {
        let mut ledger = self.ledger.lock()?;
        Ok(ledger.apply_remote_create(&local_id, Ok(remote_id)).into())
    }

    /// Report that the remote create for a record failed.
    pub fn report_remote_failure(
        &self,
        local_id: String,
        reason: String,
    ) -> Result<FfiPromotion, HealthRecordsError> {
        let mut ledger = self.ledger.lock()?;
        let result = Err(RemoteError::Unavailable(reason));
        Ok(ledger.apply_remote_create(&local_id, result).into())
    }

    /// Move a failed record back to pending before the host retries it.
    pub fn retry_record(
        &self,
        id: String,
        owner_id: String,
    ) -> Result<Option<FfiRecord>, HealthRecordsError> {
        let mut ledger = self.ledger.lock()?;
        Ok(ledger.mark_pending(&id, &owner_id).map(Into::into))
    }

    /// Delete a record locally. A synced record stays queued for a remote
    /// delete until the host reports it with `confirm_remote_delete`.
    pub fn delete_record(&self, id: String) -> Result<FfiDeletion, HealthRecordsError> {
        let mut ledger = self.ledger.lock()?;
        let removed = ledger.remove(&id);
        let remote_delete_id = removed
            .as_ref()
            .filter(|e| e.is_synced())
            .map(|e| e.id.clone());
        Ok(FfiDeletion {
            removed: removed.map(Into::into),
            remote_delete_id,
        })
    }

    /// Report that the remote store deleted `remote_id`.
    pub fn confirm_remote_delete(&self, remote_id: String) -> Result<bool, HealthRecordsError> {
        let mut ledger = self.ledger.lock()?;
        Ok(ledger.confirm_remote_delete(&remote_id))
    }

    /// Remote ids the host still has to delete remotely.
    pub fn pending_remote_deletes(&self) -> Result<Vec<String>, HealthRecordsError> {
        let ledger = self.ledger.lock()?;
        Ok(ledger.pending_deletes().to_vec())
    }

    /// Merge records listed by the remote store for `owner_id`.
    pub fn merge_remote_records(
        &self,
        owner_id: String,
        records: Vec<FfiRemoteRecord>,
    ) -> Result<u32, HealthRecordsError> {
        let remote = records
            .into_iter()
            .map(RemoteRecord::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        let mut ledger = self.ledger.lock()?;
        Ok(ledger.merge_remote(&owner_id, remote) as u32)
    }

    // =========================================================================
    // Query Operations
    // =========================================================================

    /// Filter, sort and paginate the record list.
    pub fn query_records(&self, query: FfiRecordQuery) -> Result<FfiQueryPage, HealthRecordsError> {
        let query = query.into_query(self.page_size)?;
        let ledger = self.ledger.lock()?;
        Ok(query.apply(ledger.entries()).into())
    }

    /// Counts of records by sync state.
    pub fn get_sync_stats(&self) -> Result<FfiSyncStats, HealthRecordsError> {
        let ledger = self.ledger.lock()?;
        Ok(ledger.stats().into())
    }

    /// Check if there are records not mirrored remotely.
    pub fn has_unsynced_changes(&self) -> Result<bool, HealthRecordsError> {
        let ledger = self.ledger.lock()?;
        Ok(ledger.has_unsynced_changes())
    }

    // =========================================================================
    // Export Operations
    // =========================================================================

    /// Export all records as JSON.
    pub fn export_records_json(&self) -> Result<String, HealthRecordsError> {
        let ledger = self.ledger.lock()?;
        Ok(export::export_records_json(ledger.entries())?)
    }

    /// Build the share payload JSON for the public record view.
    pub fn build_share_payload(
        &self,
        profile: Option<FfiShareProfile>,
    ) -> Result<String, HealthRecordsError> {
        let ledger = self.ledger.lock()?;
        let payload = export::SharePayload::build(profile.map(Into::into), ledger.entries())?;
        Ok(payload.to_json()?)
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe record form.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiNewRecord {
    pub age: Option<String>,
    pub date: Option<String>,
    pub disease: Option<String>,
    pub hospital: Option<String>,
    pub doctor: Option<String>,
    pub file_ref: Option<String>,
}

impl From<FfiNewRecord> for NewRecord {
    fn from(form: FfiNewRecord) -> Self {
        NewRecord {
            age: form.age,
            date: form.date,
            disease: form.disease,
            hospital: form.hospital,
            doctor: form.doctor,
            file_ref: form.file_ref,
        }
    }
}

/// FFI-safe sync state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum FfiSyncState {
    Pending,
    Synced,
    Failed,
}

impl From<SyncState> for FfiSyncState {
    fn from(state: SyncState) -> Self {
        match state {
            SyncState::Pending => FfiSyncState::Pending,
            SyncState::Synced => FfiSyncState::Synced,
            SyncState::Failed => FfiSyncState::Failed,
        }
    }
}

/// FFI-safe record.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiRecord {
    pub id: String,
    pub owner_id: Option<String>,
    pub age: u32,
    pub date: String,
    pub disease: String,
    pub hospital: String,
    pub doctor: String,
    pub file_ref: Option<String>,
    pub created_at: String,
    pub sync_state: FfiSyncState,
    pub is_local_id: bool,
}

impl From<RecordEntry> for FfiRecord {
    fn from(entry: RecordEntry) -> Self {
        let is_local_id = entry.id_kind() == IdKind::Local;
        Self {
            id: entry.id,
            owner_id: entry.owner_id,
            age: entry.age,
            date: entry.date,
            disease: entry.disease,
            hospital: entry.hospital,
            doctor: entry.doctor,
            file_ref: entry.file_ref,
            created_at: entry.created_at,
            sync_state: entry.sync_state.into(),
            is_local_id,
        }
    }
}

/// FFI-safe outcome of a reported remote create.
#[derive(Debug, Clone, uniffi::Enum)]
pub enum FfiPromotion {
    Promoted { record: FfiRecord },
    AlreadyPresent { remote_id: String },
    MarkedFailed { record: FfiRecord, reason: String },
    /// The record was deleted meanwhile; the host should delete
    /// `orphaned_remote_id` remotely if present.
    Stale { orphaned_remote_id: Option<String> },
}

impl From<Promotion> for FfiPromotion {
    fn from(promotion: Promotion) -> Self {
        match promotion {
            Promotion::Promoted(entry) => FfiPromotion::Promoted {
                record: entry.into(),
            },
            Promotion::AlreadyPresent { remote_id } => FfiPromotion::AlreadyPresent { remote_id },
            Promotion::MarkedFailed { entry, reason } => FfiPromotion::MarkedFailed {
                record: entry.into(),
                reason,
            },
            Promotion::Stale { remote_id } => FfiPromotion::Stale {
                orphaned_remote_id: remote_id,
            },
        }
    }
}

/// FFI-safe deletion result.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiDeletion {
    pub removed: Option<FfiRecord>,
    /// Set when the record was synced; the host deletes it remotely and confirms
    pub remote_delete_id: Option<String>,
}

/// FFI-safe record listed by the remote store.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiRemoteRecord {
    pub remote_id: String,
    pub form: FfiNewRecord,
    pub created_at: Option<String>,
}

impl TryFrom<FfiRemoteRecord> for RemoteRecord {
    type Error = ValidationError;

    fn try_from(record: FfiRemoteRecord) -> Result<Self, Self::Error> {
        let fields = NewRecord::from(record.form).validate()?;
        Ok(RemoteRecord {
            remote_id: record.remote_id,
            fields,
            created_at: record.created_at,
        })
    }
}

/// FFI-safe query.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiRecordQuery {
    pub term: String,
    /// "all" or a column name
    pub column: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub sort_key: Option<String>,
    /// "ascending" or "descending"
    pub sort_direction: Option<String>,
    pub page: u32,
    /// Falls back to the configured page size
    pub page_size: Option<u32>,
}

impl FfiRecordQuery {
    fn into_query(self, default_page_size: usize) -> Result<RecordQuery, query::QueryError> {
        let sort = match self.sort_key {
            Some(key) => {
                let direction = match self.sort_direction {
                    Some(d) => d.parse()?,
                    None => Direction::Ascending,
                };
                Some((key.parse::<Column>()?, direction))
            }
            None => None,
        };
        Ok(RecordQuery {
            term: self.term,
            column: self.column.parse()?,
            start_date: self.start_date.filter(|s| !s.is_empty()),
            end_date: self.end_date.filter(|s| !s.is_empty()),
            sort,
            page: self.page as usize,
            page_size: self
                .page_size
                .map(|p| p as usize)
                .unwrap_or(default_page_size),
        })
    }
}

/// FFI-safe query result page.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiQueryPage {
    pub items: Vec<FfiRecord>,
    pub total_matches: u32,
    pub total_pages: u32,
    pub page: u32,
}

impl From<QueryPage> for FfiQueryPage {
    fn from(page: QueryPage) -> Self {
        Self {
            items: page.items.into_iter().map(Into::into).collect(),
            total_matches: page.total_matches as u32,
            total_pages: page.total_pages as u32,
            page: page.page as u32,
        }
    }
}

/// FFI-safe sync statistics.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSyncStats {
    pub total: u32,
    pub pending: u32,
    pub synced: u32,
    pub failed: u32,
}

impl From<SyncStats> for FfiSyncStats {
    fn from(stats: SyncStats) -> Self {
        Self {
            total: stats.total,
            pending: stats.pending,
            synced: stats.synced,
            failed: stats.failed,
        }
    }
}

/// FFI-safe share profile.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiShareProfile {
    pub name: Option<String>,
    pub age: Option<u32>,
    pub email: Option<String>,
    pub location: Option<String>,
    pub existing_disease: Option<String>,
}

impl From<FfiShareProfile> for export::ShareProfile {
    fn from(profile: FfiShareProfile) -> Self {
        export::ShareProfile {
            name: profile.name,
            age: profile.age,
            email: profile.email,
            location: profile.location,
            existing_disease: profile.existing_disease,
        }
    }
}
