use crate::constants::UPLOAD_FIELD;
use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;
use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use codedrop_core::constants::{DEFAULT_CONTENT_TYPE, DEFAULT_FILE_NAME};
use codedrop_core::{AppError, FileEntry};
use codedrop_services::{StorageError, UploadStream};
use futures::StreamExt;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    /// Retrieval code to share with the recipient.
    pub code: String,
    pub file_name: String,
    pub file_size: u64,
    pub expires_at: DateTime<Utc>,
}

impl From<FileEntry> for UploadResponse {
    fn from(entry: FileEntry) -> Self {
        Self {
            success: true,
            code: entry.code,
            file_name: entry.file_name,
            file_size: entry.file_size,
            expires_at: entry.expires_at,
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/upload",
    tag = "files",
    request_body(content = inline(Object), content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "File stored; share the returned code", body = UploadResponse),
        (status = 400, description = "Missing, empty or malformed file field", body = ErrorResponse),
        (status = 413, description = "File too large", body = ErrorResponse),
        (status = 503, description = "Storage or code space temporarily unavailable", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, multipart), fields(operation = "upload_file"))]
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, HttpAppError> {
    let limit = state.exchange.config().max_size_bytes;

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let file_name = field.file_name().unwrap_or(DEFAULT_FILE_NAME).to_string();
        let content_type = field
            .content_type()
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();

        // The field is streamed straight into the store; the exchange counts bytes as they arrive.
        let body: UploadStream<'_> = Box::pin(field.map(move |chunk| {
            chunk.map_err(|e| {
                if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
                    StorageError::PayloadTooLarge { limit }
                } else {
                    StorageError::BodyInterrupted(e.body_text())
                }
            })
        }));

        let entry = state
            .exchange
            .upload(&file_name, &content_type, None, body)
            .await?;

        return Ok(Json(entry.into()));
    }

    Err(AppError::InvalidInput("No file provided".to_string()).into())
}
