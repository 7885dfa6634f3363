use crate::index::{EntryIndex, Slot};
use crate::staging::{SizeLimit, StagedContent, StagedPayload};
use crate::traits::{
    ByteStream, CodeStream, ExpiringStore, StorageError, StorageResult, UploadStream,
};
use crate::StorageBackend;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use codedrop_core::{Clock, FileEntry};
use futures::stream;
use futures::StreamExt;
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::fs;
use tempfile::TempPath;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

const ENTRIES_DIR: &str = "entries";
const STAGING_DIR: &str = "staging";
const DATA_EXT: &str = "bin";
const META_EXT: &str = "json";
const READ_CHUNK_SIZE: usize = 64 * 1024;

/// Published payload on disk: `{stem}.bin` holds the bytes, `{stem}.json` the entry.
///
/// Once discarded, the files are unlinked when the last holder lets go. Open download
/// streams are holders, so an evicted file keeps streaming until its readers finish.
#[derive(Debug)]
struct StoredPayload {
    data_path: PathBuf,
    meta_path: PathBuf,
    discarded: AtomicBool,
}

impl StoredPayload {
    fn new(data_path: PathBuf, meta_path: PathBuf) -> Self {
        Self {
            data_path,
            meta_path,
            discarded: AtomicBool::new(false),
        }
    }

    /// A payload that is still being published. Its files are unlinked on drop
    /// until [`keep`](Self::keep) is called.
    fn pending(data_path: PathBuf, meta_path: PathBuf) -> Self {
        Self {
            data_path,
            meta_path,
            discarded: AtomicBool::new(true),
        }
    }

    fn keep(&self) {
        self.discarded.store(false, Ordering::Release);
    }

    fn discard(&self) {
        self.discarded.store(true, Ordering::Release);
    }
}

impl Drop for StoredPayload {
    fn drop(&mut self) {
        if !self.discarded.load(Ordering::Acquire) {
            return;
        }
        let paths = [
            std::mem::take(&mut self.meta_path),
            std::mem::take(&mut self.data_path),
        ];
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => drop(handle.spawn_blocking(move || remove_files(&paths))),
            Err(_) => remove_files(&paths),
        }
    }
}

fn remove_files(paths: &[PathBuf]) {
    for path in paths {
        match std::fs::remove_file(path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    path = %path.display(),
                    "Failed to remove evicted file"
                );
            }
        }
    }
}

/// Move a staged upload into `entries/` and write its sidecar next to it.
///
/// Runs on the blocking pool. The sidecar is written under `part_path` first so a
/// sidecar in `entries/` is always complete.
fn publish_files(
    scratch: TempPath,
    stored: &StoredPayload,
    part_path: &Path,
    sidecar: &[u8],
) -> std::io::Result<()> {
    std::fs::rename(&scratch, &stored.data_path)?;
    if let Err(e) = scratch.keep() {
        tracing::debug!(error = %e.error, "Scratch path already released");
    }

    let written = std::fs::write(part_path, sidecar)
        .and_then(|()| std::fs::rename(part_path, &stored.meta_path));
    if written.is_err() {
        remove_files(&[part_path.to_path_buf()]);
    }
    written
}

/// Marks an evicted slot for deletion; the files go away once no reader holds them.
fn discard_slot(slot: Slot<Arc<StoredPayload>>) {
    slot.payload.discard();
}

/// Local filesystem store
///
/// Layout under the root directory:
/// - `entries/` published payloads and their JSON sidecars
/// - `staging/` uploads still being received
///
/// Sidecars let the index be rebuilt after a restart.
pub struct LocalStore {
    root: PathBuf,
    entries_dir: PathBuf,
    staging_dir: PathBuf,
    index: EntryIndex<Arc<StoredPayload>>,
    clock: Arc<dyn Clock>,
}

impl LocalStore {
    /// Open (or create) a store rooted at `root`.
    ///
    /// Leftover scratch files are removed and entries with a valid sidecar are loaded
    /// back into the index, expired ones included so the reaper can clear them.
    pub async fn open(root: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> StorageResult<Self> {
        let root = root.into();
        let entries_dir = root.join(ENTRIES_DIR);
        let staging_dir = root.join(STAGING_DIR);

        for dir in [&entries_dir, &staging_dir] {
            fs::create_dir_all(dir).await.map_err(|e| {
                StorageError::ConfigError(format!(
                    "Failed to create storage directory {}: {}",
                    dir.display(),
                    e
                ))
            })?;
        }

        let store = Self {
            root,
            entries_dir,
            staging_dir,
            index: EntryIndex::new(),
            clock,
        };

        let cleared = store.clear_staging().await?;
        let recovered = store.recover().await?;

        tracing::info!(
            root = %store.root.display(),
            recovered = recovered,
            cleared_scratch = cleared,
            "Local store opened"
        );

        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Entries currently on disk, including expired ones awaiting the reaper.
    pub fn stored_len(&self) -> usize {
        self.index.stored_count()
    }

    async fn clear_staging(&self) -> StorageResult<usize> {
        let mut cleared = 0;
        let mut dir = fs::read_dir(&self.staging_dir).await?;
        while let Some(item) = dir.next_entry().await? {
            if item.file_type().await?.is_file() {
                remove_if_present(&item.path()).await;
                cleared += 1;
            }
        }
        Ok(cleared)
    }

    async fn recover(&self) -> StorageResult<usize> {
        let mut data_files = Vec::new();
        let mut meta_files = Vec::new();

        let mut dir = fs::read_dir(&self.entries_dir).await?;
        while let Some(item) = dir.next_entry().await? {
            let path = item.path();
            match path.extension().and_then(|ext| ext.to_str()) {
                Some(DATA_EXT) => data_files.push(path),
                Some(META_EXT) => meta_files.push(path),
                _ => {}
            }
        }

        let mut kept_stems = HashSet::new();
        let mut recovered = 0;

        for meta_path in meta_files {
            let data_path = meta_path.with_extension(DATA_EXT);
            match load_sidecar(&meta_path, &data_path).await {
                Ok(entry) => {
                    let stem = file_stem(&meta_path);
                    let payload = Arc::new(StoredPayload::new(data_path, meta_path));
                    if let Some(loser) = self.index.insert_recovered(entry, payload) {
                        tracing::warn!(code = %loser.entry.code, "Dropping duplicate recovered entry");
                        discard_slot(loser);
                    } else {
                        recovered += 1;
                    }
                    kept_stems.insert(stem);
                }
                Err(reason) => {
                    tracing::warn!(
                        path = %meta_path.display(),
                        reason = %reason,
                        "Discarding unreadable entry"
                    );
                    remove_if_present(&meta_path).await;
                    remove_if_present(&data_path).await;
                }
            }
        }

        for data_path in data_files {
            if !kept_stems.contains(&file_stem(&data_path)) {
                tracing::debug!(path = %data_path.display(), "Removing orphaned payload");
                remove_if_present(&data_path).await;
            }
        }

        Ok(recovered)
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

async fn remove_if_present(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        if e.kind() != ErrorKind::NotFound {
            tracing::warn!(error = %e, path = %path.display(), "Failed to remove file");
        }
    }
}

/// Read a sidecar and check it against its payload file.
async fn load_sidecar(meta_path: &Path, data_path: &Path) -> Result<FileEntry, String> {
    let raw = fs::read(meta_path).await.map_err(|e| e.to_string())?;
    let entry: FileEntry = serde_json::from_slice(&raw).map_err(|e| e.to_string())?;
    let data = fs::metadata(data_path)
        .await
        .map_err(|e| format!("payload missing: {}", e))?;
    if data.len() != entry.file_size {
        return Err(format!(
            "payload is {} bytes, sidecar says {}",
            data.len(),
            entry.file_size
        ));
    }
    Ok(entry)
}

#[async_trait]
impl ExpiringStore for LocalStore {
    async fn stage(
        &self,
        mut body: UploadStream<'_>,
        max_size: u64,
    ) -> StorageResult<StagedPayload> {
        let scratch = tempfile::Builder::new()
            .prefix("upload-")
            .suffix(".part")
            .tempfile_in(&self.staging_dir)
            .map_err(|e| StorageError::UploadFailed(format!("Failed to create scratch file: {}", e)))?;
        let (file, temp_path) = scratch.into_parts();
        let mut file = fs::File::from_std(file);
        let mut limit = SizeLimit::new(max_size);

        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            limit.admit(chunk.len())?;
            file.write_all(&chunk).await.map_err(|e| {
                StorageError::UploadFailed(format!(
                    "Failed to write scratch file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        file.flush().await?;
        file.sync_all().await.map_err(|e| {
            StorageError::UploadFailed(format!(
                "Failed to sync scratch file {}: {}",
                temp_path.display(),
                e
            ))
        })?;
        drop(file);

        tracing::debug!(
            path = %temp_path.display(),
            size_bytes = limit.received(),
            "Staged upload on disk"
        );
        Ok(StagedPayload::on_disk(temp_path, limit.received()))
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

        let temp_path = match payload.into_content() {
            StagedContent::File(path) => path,
            StagedContent::Memory(_) => {
                return Err(StorageError::BackendError(
                    "Local store received a payload staged in memory".to_string(),
                ))
            }
        };

        let stem = Uuid::new_v4().simple().to_string();
        let stored = Arc::new(StoredPayload::pending(
            self.entries_dir.join(format!("{}.{}", stem, DATA_EXT)),
            self.entries_dir.join(format!("{}.{}", stem, META_EXT)),
        ));
        let part_path = self.staging_dir.join(format!("{}.{}.part", stem, META_EXT));
        let sidecar = serde_json::to_vec(&entry).map_err(|e| {
            StorageError::BackendError(format!("Failed to encode sidecar: {}", e))
        })?;

        // The task owns a handle too: if this future is dropped mid-publish, the files
        // are unlinked once the task lets go of it.
        let publishing = Arc::clone(&stored);
        let published = tokio::task::spawn_blocking(move || {
            publish_files(temp_path, &publishing, &part_path, &sidecar)
        })
        .await
        .map_err(|e| StorageError::UploadFailed(format!("Publish task failed: {}", e)))?;
        published.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to publish {}: {}", entry.code, e))
        })?;

        stored.keep();
        let code = entry.code.clone();
        let size = entry.file_size;
        if let Some(replaced) = reservation.commit(entry, stored) {
            tracing::debug!(code = %code, "Replaced expired entry");
            discard_slot(replaced);
        }

        tracing::info!(code = %code, size_bytes = size, "Local store entry published");
        Ok(())
    }

    async fn get(&self, code: &str) -> StorageResult<Option<FileEntry>> {
        Ok(self
            .index
            .get(code, self.clock.now())
            .map(|(entry, _)| entry))
    }

    async fn open_read(&self, code: &str) -> StorageResult<Option<(FileEntry, ByteStream)>> {
        let Some((entry, stored)) = self.index.get(code, self.clock.now()) else {
            return Ok(None);
        };

        let file = fs::File::open(&stored.data_path).await.map_err(|e| {
            StorageError::DownloadFailed(format!(
                "Failed to open {}: {}",
                stored.data_path.display(),
                e
            ))
        })?;
        let on_disk = file.metadata().await?.len();
        if on_disk != entry.file_size {
            return Err(StorageError::DownloadFailed(format!(
                "Payload for {} is {} bytes, expected {}",
                entry.code, on_disk, entry.file_size
            )));
        }

        let stream = ReaderStream::with_capacity(file, READ_CHUNK_SIZE).map(move |chunk| {
            let _holder = &stored;
            chunk.map_err(StorageError::from)
        });

        Ok(Some((entry, Box::pin(stream))))
    }

    async fn delete(&self, code: &str) -> StorageResult<bool> {
        match self.index.remove(code) {
            Some(slot) => {
                discard_slot(slot);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_live(&self, code: &str, now: DateTime<Utc>) -> StorageResult<bool> {
        match self.index.remove_live(code, now) {
            Some(slot) => {
                discard_slot(slot);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_expired(&self, code: &str, now: DateTime<Utc>) -> StorageResult<bool> {
        match self.index.remove_expired(code, now) {
            Some(slot) => {
                discard_slot(slot);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_expired(&self, now: DateTime<Utc>) -> StorageResult<CodeStream> {
        Ok(stream::iter(self.index.expired_codes(now)).boxed())
    }

    async fn live_count(&self) -> StorageResult<usize> {
        Ok(self.index.live_count(self.clock.now()))
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}
