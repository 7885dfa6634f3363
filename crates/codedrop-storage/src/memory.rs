use crate::index::EntryIndex;
use crate::staging::{SizeLimit, StagedContent, StagedPayload};
use crate::traits::{
    ByteStream, CodeStream, ExpiringStore, StorageError, StorageResult, UploadStream,
};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use codedrop_core::{Clock, FileEntry};
use futures::stream;
use futures::StreamExt;
use std::sync::Arc;

/// Size of the slices handed out by download streams.
const READ_CHUNK_SIZE: usize = 64 * 1024;

/// In-process store.
///
/// Payloads are reference-counted buffers: an open download stream holds its own
/// reference, so deleting an entry only frees the bytes once every reader is done.
/// Contents do not survive a restart.
pub struct MemoryStore {
    index: EntryIndex<Bytes>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            index: EntryIndex::new(),
            clock,
        }
    }

    /// Entries still held in memory, including expired ones awaiting the reaper.
    pub fn stored_len(&self) -> usize {
        self.index.stored_count()
    }
}

fn chunked(payload: Bytes) -> ByteStream {
    let chunks = stream::unfold(payload, |mut remaining| async move {
        if remaining.is_empty() {
            return None;
        }
        let take = remaining.len().min(READ_CHUNK_SIZE);
        let chunk = remaining.split_to(take);
        Some((Ok(chunk), remaining))
    });
    Box::pin(chunks)
}

#[async_trait]
impl ExpiringStore for MemoryStore {
    async fn stage(
        &self,
        mut body: UploadStream<'_>,
        max_size: u64,
    ) -> StorageResult<StagedPayload> {
        let mut limit = SizeLimit::new(max_size);
        let mut buffer = BytesMut::new();

        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            limit.admit(chunk.len())?;
            buffer.extend_from_slice(&chunk);
        }

        tracing::debug!(size_bytes = limit.received(), "Staged upload in memory");
        Ok(StagedPayload::in_memory(buffer.freeze()))
    }

    async fn put(&self, entry: FileEntry, payload: StagedPayload) -> StorageResult<()> {
        if entry.file_size != payload.size() {
            return Err(StorageError::UploadFailed(format!(
                "Entry size {} does not match staged size {}",
                entry.file_size,
                payload.size()
            )));
        }

        let Some(reservation) = self.index.reserve(&entry.code, self.clock.now()) else {
            return Err(StorageError::CodeConflict {
                code: entry.code,
                payload: Box::new(payload),
            });
        };

        let bytes = match payload.into_content() {
            StagedContent::Memory(bytes) => bytes,
            StagedContent::File(_) => {
                return Err(StorageError::BackendError(
                    "Memory store received a payload staged on disk".to_string(),
                ))
            }
        };

        let code = entry.code.clone();
        let size = entry.file_size;
        let replaced = reservation.commit(entry, bytes);
        drop(replaced);

        tracing::info!(code = %code, size_bytes = size, "Memory store entry published");
        Ok(())
    }

    async fn get(&self, code: &str) -> StorageResult<Option<FileEntry>> {
        Ok(self
            .index
            .get(code, self.clock.now())
            .map(|(entry, _)| entry))
    }

    async fn open_read(&self, code: &str) -> StorageResult<Option<(FileEntry, ByteStream)>> {
        Ok(self
            .index
            .get(code, self.clock.now())
            .map(|(entry, payload)| (entry, chunked(payload))))
    }

    async fn delete(&self, code: &str) -> StorageResult<bool> {
        let removed = self.index.remove(code);
        Ok(removed.is_some())
    }

    async fn delete_live(&self, code: &str, now: DateTime<Utc>) -> StorageResult<bool> {
        Ok(self.index.remove_live(code, now).is_some())
    }

    async fn delete_expired(&self, code: &str, now: DateTime<Utc>) -> StorageResult<bool> {
        Ok(self.index.remove_expired(code, now).is_some())
    }

    async fn list_expired(&self, now: DateTime<Utc>) -> StorageResult<CodeStream> {
        Ok(stream::iter(self.index.expired_codes(now)).boxed())
    }

    async fn live_count(&self) -> StorageResult<usize> {
        Ok(self.index.live_count(self.clock.now()))
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Memory
    }
}
