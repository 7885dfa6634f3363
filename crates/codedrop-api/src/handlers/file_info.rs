use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    Json,
};
use codedrop_core::FileMetadata;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct FileInfoResponse {
    pub success: bool,
    #[serde(flatten)]
    pub metadata: FileMetadata,
}

#[utoipa::path(
    get,
    path = "/api/file/{code}/info",
    tag = "files",
    params(
        ("code" = String, Path, description = "Retrieval code (case-insensitive)")
    ),
    responses(
        (status = 200, description = "File metadata", body = FileInfoResponse),
        (status = 400, description = "Malformed code", body = ErrorResponse),
        (status = 404, description = "File not found or expired", body = ErrorResponse)
    )
)]
pub async fn get_file_info(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<Json<FileInfoResponse>, HttpAppError> {
    let metadata = state.exchange.info(&code).await?;
    Ok(Json(FileInfoResponse {
        success: true,
        metadata,
    }))
}
