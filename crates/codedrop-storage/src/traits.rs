//! Expiring store abstraction
//!
//! This module defines the [`ExpiringStore`] trait that every backend implements, and
//! the errors those backends report.

use crate::staging::StagedPayload;
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use codedrop_core::{AppError, FileEntry};
use futures::stream::BoxStream;
use futures::Stream;
use std::pin::Pin;
use thiserror::Error;

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Payload exceeds the limit of {limit} bytes")]
    PayloadTooLarge { limit: u64 },

    /// A live entry already owns the code. The staged payload is returned untouched.
    #[error("Code already in use: {code}")]
    CodeConflict {
        code: String,
        payload: Box<StagedPayload>,
    },

    #[error("Upload body interrupted: {0}")]
    BodyInterrupted(String),

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Payload bytes handed to a reader. Finite and not restartable.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StorageError>> + Send>>;

/// Request body handed to [`ExpiringStore::stage`]. May borrow from the request.
pub type UploadStream<'a> = Pin<Box<dyn Stream<Item = Result<Bytes, StorageError>> + Send + 'a>>;

/// Codes produced by [`ExpiringStore::list_expired`].
pub type CodeStream = BoxStream<'static, String>;

/// Storage for file entries addressed by retrieval code, each with its own expiry.
///
/// Visibility rule shared by `get` and `open_read`: an entry is returned only while
/// `now < expires_at`. Expired entries may still occupy space until `delete` removes
/// them, but they are never served. "Expired" and "never existed" both come back as
/// `None`.
#[async_trait]
pub trait ExpiringStore: Send + Sync {
    /// Drain an upload body into scratch space owned by this store.
    ///
    /// Fails with `PayloadTooLarge` as soon as more than `max_size` bytes have been
    /// received, without reading the rest of the body. Dropping the returned payload
    /// (or the future) releases the scratch space.
    async fn stage(&self, body: UploadStream<'_>, max_size: u64) -> StorageResult<StagedPayload>;

    /// Publish a staged payload under `entry.code`.
    ///
    /// Once this returns `Ok`, every subsequent lookup sees the complete entry. Fails
    /// with `CodeConflict` (carrying the payload back) if a live entry or an in-flight
    /// upload already holds the code. An expired entry under the same code is replaced.
    async fn put(&self, entry: FileEntry, payload: StagedPayload) -> StorageResult<()>;

    /// Look up a live entry.
    async fn get(&self, code: &str) -> StorageResult<Option<FileEntry>>;

    /// Open a live entry for reading.
    async fn open_read(&self, code: &str) -> StorageResult<Option<(FileEntry, ByteStream)>>;

    /// Remove an entry, expired or not. Returns whether anything was removed.
    async fn delete(&self, code: &str) -> StorageResult<bool>;

    /// Delete `code` only if its entry is live at `now`. An expired entry is left for
    /// eviction and reported as not removed.
    async fn delete_live(&self, code: &str, now: DateTime<Utc>) -> StorageResult<bool>;

    /// Delete `code` only if its entry is expired at `now`. Used by eviction so that a
    /// code reissued after the scan is never removed.
    async fn delete_expired(&self, code: &str, now: DateTime<Utc>) -> StorageResult<bool>;

    /// Codes whose `expires_at <= now`, as a snapshot taken when called.
    async fn list_expired(&self, now: DateTime<Utc>) -> StorageResult<CodeStream>;

    /// Number of live entries.
    async fn live_count(&self) -> StorageResult<usize>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}

fn describe_limit(limit: u64) -> String {
    if limit >= BYTES_PER_MB && limit % BYTES_PER_MB == 0 {
        format!("{} MB", limit / BYTES_PER_MB)
    } else {
        format!("{} bytes", limit)
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::PayloadTooLarge { limit } => AppError::PayloadTooLarge(format!(
                "File exceeds the maximum upload size of {}",
                describe_limit(limit)
            )),
            StorageError::CodeConflict { code, .. } => {
                AppError::Internal(format!("Unresolved code conflict for {}", code))
            }
            StorageError::BodyInterrupted(msg) => {
                AppError::InvalidInput(format!("Upload was interrupted: {}", msg))
            }
            StorageError::ConfigError(msg) => AppError::Internal(msg),
            StorageError::UploadFailed(msg)
            | StorageError::DownloadFailed(msg)
            | StorageError::DeleteFailed(msg)
            | StorageError::BackendError(msg) => AppError::StorageUnavailable(msg),
            StorageError::IoError(err) => AppError::StorageUnavailable(format!("IO error: {}", err)),
        }
    }
}
