//! Share payload for the public record view (encoded into a QR code by the host).

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{ExportError, ExportResult};
use crate::models::RecordEntry;

/// Profile fields included in a share payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ShareProfile {
    pub name: Option<String>,
    pub age: Option<u32>,
    pub email: Option<String>,
    pub location: Option<String>,
    pub existing_disease: Option<String>,
}

/// A record reduced to its shareable fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ShareRecord {
    pub age: u32,
    pub date: String,
    pub disease: String,
    pub hospital: String,
    pub doctor: String,
    pub file_ref: Option<String>,
}

impl From<&RecordEntry> for ShareRecord {
    fn from(entry: &RecordEntry) -> Self {
        Self {
            age: entry.age,
            date: entry.date.clone(),
            disease: entry.disease.clone(),
            hospital: entry.hospital.clone(),
            doctor: entry.doctor.clone(),
            file_ref: entry.file_ref.clone(),
        }
    }
}

/// Payload behind the public record view.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SharePayload {
    pub profile: Option<ShareProfile>,
    pub records: Vec<ShareRecord>,
    /// SHA-256 of the canonical records JSON, hex encoded
    pub checksum: String,
    pub generated_at: String,
}

impl SharePayload {
    /// Build a payload from the current record list.
    pub fn build(profile: Option<ShareProfile>, entries: &[RecordEntry]) -> ExportResult<Self> {
        let records: Vec<ShareRecord> = entries.iter().map(ShareRecord::from).collect();
        let checksum = records_checksum(&records)?;
        Ok(Self {
            profile,
            records,
            checksum,
            generated_at: chrono::Utc::now().to_rfc3339(),
        })
    }

    /// Compact JSON suitable for QR encoding.
    pub fn to_json(&self) -> ExportResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a scanned payload and verify its checksum.
    pub fn from_json(json: &str) -> ExportResult<Self> {
        let payload: SharePayload = serde_json::from_str(json)?;
        payload.verify()?;
        Ok(payload)
    }

    /// Check that the records match the checksum.
    pub fn verify(&self) -> ExportResult<()> {
        let found = records_checksum(&self.records)?;
        if found != self.checksum {
            return Err(ExportError::ChecksumMismatch {
                expected: self.checksum.clone(),
                found,
            });
        }
        Ok(())
    }
}

fn records_checksum(records: &[ShareRecord]) -> ExportResult<String> {
    let canonical = serde_json::to_vec(records)?;
    Ok(hex::encode(Sha256::digest(&canonical)))
}
