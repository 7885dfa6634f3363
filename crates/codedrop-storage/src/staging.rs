//! Staged upload payloads
//!
//! A [`StagedPayload`] is an upload body that has been fully received and checked
//! against the size limit but is not yet visible under any code. Dropping it
//! discards the scratch data, which is how aborted or rejected uploads leave
//! nothing behind.

use crate::traits::{StorageError, StorageResult};
use bytes::Bytes;
use std::fmt;
use tempfile::TempPath;

pub struct StagedPayload {
    size: u64,
    content: StagedContent,
}

pub(crate) enum StagedContent {
    Memory(Bytes),
    /// Scratch file, deleted on drop unless published.
    File(TempPath),
}

impl StagedPayload {
    pub(crate) fn in_memory(bytes: Bytes) -> Self {
        Self {
            size: bytes.len() as u64,
            content: StagedContent::Memory(bytes),
        }
    }

    pub(crate) fn on_disk(path: TempPath, size: u64) -> Self {
        Self {
            size,
            content: StagedContent::File(path),
        }
    }

    /// Exact number of bytes received.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub(crate) fn into_content(self) -> StagedContent {
        self.content
    }
}

impl fmt::Debug for StagedPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let location = match &self.content {
            StagedContent::Memory(_) => "memory".to_string(),
            StagedContent::File(path) => path.display().to_string(),
        };
        f.debug_struct("StagedPayload")
            .field("size", &self.size)
            .field("location", &location)
            .finish()
    }
}

/// Running byte count for a body being staged.
#[derive(Debug)]
pub(crate) struct SizeLimit {
    limit: u64,
    received: u64,
}

impl SizeLimit {
    pub(crate) fn new(limit: u64) -> Self {
        Self { limit, received: 0 }
    }

    /// Account for the next chunk, failing before it is written if it would cross the limit.
    pub(crate) fn admit(&mut self, chunk_len: usize) -> StorageResult<()> {
        let total = self.received.saturating_add(chunk_len as u64);
        if total > self.limit {
            return Err(StorageError::PayloadTooLarge { limit: self.limit });
        }
        self.received = total;
        Ok(())
    }

    pub(crate) fn received(&self) -> u64 {
        self.received
    }
}
