use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::types::{UnknownVariant, UploadPurpose};

/// Bookkeeping record for one stored file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadDescriptor {
    pub generated_name: String,
    pub original_name: String,
    /// Relative to the upload root
    pub storage_path: String,
    pub size: u64,
    pub mime_type: String,
    /// Hex-encoded SHA-256 of the stored bytes
    pub checksum: String,
    pub owner_id: Uuid,
    pub purpose: UploadPurpose,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct UploadRow {
    pub generated_name: String,
    pub original_name: String,
    pub storage_path: String,
    pub size: i64,
    pub mime_type: String,
    pub checksum: String,
    pub owner_id: Uuid,
    pub purpose: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<UploadRow> for UploadDescriptor {
    type Error = UnknownVariant;

    fn try_from(row: UploadRow) -> Result<Self, Self::Error> {
        Ok(UploadDescriptor {
            generated_name: row.generated_name,
            original_name: row.original_name,
            storage_path: row.storage_path,
            size: row.size.max(0) as u64,
            mime_type: row.mime_type,
            checksum: row.checksum,
            owner_id: row.owner_id,
            purpose: row.purpose.parse()?,
            created_at: row.created_at,
        })
    }
}
