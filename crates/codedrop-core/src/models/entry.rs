use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One uploaded file as known to the store.
///
/// The payload bytes are not part of this struct: they are owned by the store
/// backend and reached through `ExpiringStore::open_read`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub code: String,
    pub file_name: String,
    pub file_size: u64,
    pub content_type: String,
    pub upload_time: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl FileEntry {
    /// True once the TTL has elapsed at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn metadata(&self) -> FileMetadata {
        FileMetadata::from(self)
    }
}

/// Public view of an entry returned by info and download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub file_name: String,
    pub file_size: u64,
    pub content_type: String,
    pub upload_time: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl From<&FileEntry> for FileMetadata {
    fn from(entry: &FileEntry) -> Self {
        FileMetadata {
            file_name: entry.file_name.clone(),
            file_size: entry.file_size,
            content_type: entry.content_type.clone(),
            upload_time: entry.upload_time,
            expires_at: entry.expires_at,
        }
    }
}
