use crate::code_generator::CodeGenerator;
use codedrop_core::constants::{DEFAULT_CONTENT_TYPE, DEFAULT_FILE_NAME};
use codedrop_core::{AppError, Clock, CodeFormat, ExchangeConfig, FileEntry, FileMetadata};
use codedrop_storage::{ByteStream, ExpiringStore, StorageError, UploadStream};
use std::fmt;
use std::sync::Arc;

/// A file ready to be streamed to a client.
pub struct Download {
    pub metadata: FileMetadata,
    /// Yields exactly `metadata.file_size` bytes.
    pub body: ByteStream,
}

impl Download {
    pub fn content_length(&self) -> u64 {
        self.metadata.file_size
    }
}

impl fmt::Debug for Download {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Download")
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

/// Orchestrates the exchange on top of an [`ExpiringStore`].
///
/// Codes coming from clients are normalized and validated here before any storage
/// access. Collisions between generated codes are retried here and never reach
/// the caller.
pub struct ExchangeService {
    store: Arc<dyn ExpiringStore>,
    codes: Arc<dyn CodeGenerator>,
    format: CodeFormat,
    clock: Arc<dyn Clock>,
    config: ExchangeConfig,
}

impl ExchangeService {
    pub fn new(
        store: Arc<dyn ExpiringStore>,
        codes: Arc<dyn CodeGenerator>,
        clock: Arc<dyn Clock>,
        config: ExchangeConfig,
    ) -> Result<Self, anyhow::Error> {
        config.validate()?;
        let format = config.code_format()?;
        Ok(Self {
            store,
            codes,
            format,
            clock,
            config,
        })
    }

    pub fn config(&self) -> &ExchangeConfig {
        &self.config
    }

    pub fn code_format(&self) -> &CodeFormat {
        &self.format
    }

    /// Store an uploaded file and return its entry; `entry.code` is the retrieval code.
    ///
    /// `size_hint` is the length the client declared, if any. A hint above the limit
    /// is rejected before the body is read. The body is still counted as it arrives,
    /// so a missing or false hint cannot get an oversize file through.
    #[tracing::instrument(skip(self, body))]
    pub async fn upload(
        &self,
        file_name: &str,
        content_type: &str,
        size_hint: Option<u64>,
        body: UploadStream<'_>,
    ) -> Result<FileEntry, AppError> {
        let max_size = self.config.max_size_bytes;
        if size_hint.is_some_and(|hint| hint > max_size) {
            return Err(StorageError::PayloadTooLarge { limit: max_size }.into());
        }

        let mut staged = self.store.stage(body, max_size).await?;
        if staged.is_empty() {
            return Err(AppError::InvalidInput("File is empty".to_string()));
        }

        let file_name = display_name(file_name);
        let content_type = match content_type.trim() {
            "" => DEFAULT_CONTENT_TYPE.to_string(),
            declared => declared.to_string(),
        };
        let ttl = self.config.ttl_chrono();

        for attempt in 1..=self.config.code_max_attempts {
            let now = self.clock.now();
            let expires_at = now
                .checked_add_signed(ttl)
                .ok_or_else(|| AppError::Internal("Expiry time out of range".to_string()))?;

            let entry = FileEntry {
                code: self.codes.generate(),
                file_name: file_name.clone(),
                file_size: staged.size(),
                content_type: content_type.clone(),
                upload_time: now,
                expires_at,
            };

            match self.store.put(entry.clone(), staged).await {
                Ok(()) => {
                    tracing::info!(
                        code = %entry.code,
                        size_bytes = entry.file_size,
                        expires_at = %entry.expires_at,
                        attempts = attempt,
                        "File uploaded"
                    );
                    return Ok(entry);
                }
                Err(StorageError::CodeConflict { code, payload }) => {
                    tracing::debug!(code = %code, attempt, "Code already taken, retrying");
                    staged = *payload;
                }
                Err(e) => return Err(e.into()),
            }
        }

        tracing::error!(
            attempts = self.config.code_max_attempts,
            "Could not find a free code"
        );
        Err(AppError::CodeSpaceExhausted {
            attempts: self.config.code_max_attempts,
        })
    }

    /// Metadata of a live file.
    #[tracing::instrument(skip(self))]
    pub async fn info(&self, raw_code: &str) -> Result<FileMetadata, AppError> {
        let code = self.format.parse(raw_code)?;
        self.store
            .get(&code)
            .await?
            .map(|entry| entry.metadata())
            .ok_or(AppError::NotFound(code))
    }

    /// Open a live file for streaming.
    #[tracing::instrument(skip(self))]
    pub async fn download(&self, raw_code: &str) -> Result<Download, AppError> {
        let code = self.format.parse(raw_code)?;
        let (entry, body) = self
            .store
            .open_read(&code)
            .await?
            .ok_or(AppError::NotFound(code))?;

        tracing::debug!(code = %entry.code, size_bytes = entry.file_size, "Serving download");
        Ok(Download {
            metadata: entry.metadata(),
            body,
        })
    }

    /// Remove a live file. Returns `false` if the code is unknown or already expired.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, raw_code: &str) -> Result<bool, AppError> {
        let code = self.format.parse(raw_code)?;
        let removed = self.store.delete_live(&code, self.clock.now()).await?;
        if removed {
            tracing::info!(code = %code, "File deleted");
        }
        Ok(removed)
    }

    /// Number of files currently retrievable.
    pub async fn active_count(&self) -> Result<usize, AppError> {
        Ok(self.store.live_count().await?)
    }
}

/// Final path component of a client-supplied file name, or a placeholder.
fn display_name(raw: &str) -> String {
    let name = raw
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    if name.is_empty() {
        DEFAULT_FILE_NAME.to_string()
    } else {
        name.to_string()
    }
}
