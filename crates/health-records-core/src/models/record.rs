//! Health record models.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Prefix for identifiers generated on-device before the first sync.
pub const LOCAL_ID_PREFIX: &str = "local-";

/// Validation errors raised before any state is touched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid age: {0}")]
    InvalidAge(String),
}

/// Sync state of a record relative to the remote store.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum SyncState {
    /// Remote create not yet acknowledged
    Pending,
    /// Remote identifier known
    Synced,
    /// Remote create failed, or no session was available
    Failed,
}

/// Provenance of a record identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdKind {
    Local,
    Remote,
}

/// A submitted record form. Every field may be missing until validated.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NewRecord {
    pub age: Option<String>,
    pub date: Option<String>,
    pub disease: Option<String>,
    pub hospital: Option<String>,
    pub doctor: Option<String>,
    pub file_ref: Option<String>,
}

impl NewRecord {
    /// Create a form with all required fields set.
    pub fn new(
        age: impl Into<String>,
        date: impl Into<String>,
        disease: impl Into<String>,
        hospital: impl Into<String>,
        doctor: impl Into<String>,
    ) -> Self {
        Self {
            age: Some(age.into()),
            date: Some(date.into()),
            disease: Some(disease.into()),
            hospital: Some(hospital.into()),
            doctor: Some(doctor.into()),
            file_ref: None,
        }
    }

    /// Attach a file reference (name or URL).
    pub fn with_file_ref(mut self, file_ref: impl Into<String>) -> Self {
        self.file_ref = Some(file_ref.into());
        self
    }

    /// Check required fields and convert into typed record fields.
    pub fn validate(&self) -> Result<RecordFields, ValidationError> {
        let age_raw = required(&self.age, "age")?;
        let age = age_raw
            .parse::<u32>()
            .map_err(|_| ValidationError::InvalidAge(age_raw.to_string()))?;

        Ok(RecordFields {
            age,
            date: required(&self.date, "date")?.to_string(),
            disease: required(&self.disease, "disease")?.to_string(),
            hospital: required(&self.hospital, "hospital")?.to_string(),
            doctor: required(&self.doctor, "doctor")?.to_string(),
            file_ref: self
                .file_ref
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        })
    }
}

fn required<'a>(value: &'a Option<String>, name: &'static str) -> Result<&'a str, ValidationError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(ValidationError::MissingField(name))
}

/// Validated record payload, as sent to the remote store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecordFields {
    pub age: u32,
    pub date: String,
    pub disease: String,
    pub hospital: String,
    pub doctor: String,
    pub file_ref: Option<String>,
}

/// A medical record entry held on this device.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecordEntry {
    /// Local identifier until promoted, then the remote identifier
    pub id: String,
    /// Owning user, if a session existed at creation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    pub age: u32,
    /// ISO date (YYYY-MM-DD)
    pub date: String,
    pub disease: String,
    pub hospital: String,
    pub doctor: String,
    /// Attached file name or URL
    pub file_ref: Option<String>,
    /// Creation timestamp, immutable
    pub created_at: String,
    pub sync_state: SyncState,
}

impl RecordEntry {
    /// Create a local-only entry from validated fields.
    pub fn new_local(fields: RecordFields, owner_id: Option<String>) -> Self {
        let sync_state = if owner_id.is_some() {
            SyncState::Pending
        } else {
            SyncState::Failed
        };
        Self {
            id: format!("{}{}", LOCAL_ID_PREFIX, uuid::Uuid::new_v4()),
            owner_id,
            age: fields.age,
            date: fields.date,
            disease: fields.disease,
            hospital: fields.hospital,
            doctor: fields.doctor,
            file_ref: fields.file_ref,
            created_at: chrono::Utc::now().to_rfc3339(),
            sync_state,
        }
    }

    /// Build a synced entry from a record listed by the remote store.
    pub fn from_remote(remote_id: String, owner_id: &str, fields: RecordFields, created_at: Option<String>) -> Self {
        Self {
            id: remote_id,
            owner_id: Some(owner_id.to_string()),
            age: fields.age,
            date: fields.date,
            disease: fields.disease,
            hospital: fields.hospital,
            doctor: fields.doctor,
            file_ref: fields.file_ref,
            created_at: created_at.unwrap_or_else(|| chrono::Utc::now().to_rfc3339()),
            sync_state: SyncState::Synced,
        }
    }

    /// Identifier provenance. Only a remote acknowledgement marks an entry synced.
    pub fn id_kind(&self) -> IdKind {
        match self.sync_state {
            SyncState::Synced => IdKind::Remote,
            SyncState::Pending | SyncState::Failed => IdKind::Local,
        }
    }

    /// Check if this record has been mirrored to the remote store.
    pub fn is_synced(&self) -> bool {
        self.sync_state == SyncState::Synced
    }

    /// The payload mirrored to the remote store.
    pub fn fields(&self) -> RecordFields {
        RecordFields {
            age: self.age,
            date: self.date.clone(),
            disease: self.disease.clone(),
            hospital: self.hospital.clone(),
            doctor: self.doctor.clone(),
            file_ref: self.file_ref.clone(),
        }
    }
}
