//! Record export and share payloads.

mod share;

pub use share::*;

use thiserror::Error;

use crate::models::RecordEntry;

/// Default file name for a JSON export.
pub const EXPORT_FILE_NAME: &str = "health-records.json";

/// Export errors.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Checksum mismatch: expected {expected}, found {found}")]
    ChecksumMismatch { expected: String, found: String },
}

pub type ExportResult<T> = Result<T, ExportError>;

/// Export the full record list as pretty-printed JSON.
pub fn export_records_json(entries: &[RecordEntry]) -> ExportResult<String> {
    Ok(serde_json::to_string_pretty(entries)?)
}
