use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    Json,
};
use codedrop_core::AppError;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: String,
}

#[utoipa::path(
    delete,
    path = "/api/file/{code}",
    tag = "files",
    params(
        ("code" = String, Path, description = "Retrieval code (case-insensitive)")
    ),
    responses(
        (status = 200, description = "File deleted", body = DeleteResponse),
        (status = 400, description = "Malformed code", body = ErrorResponse),
        (status = 404, description = "File not found or expired", body = ErrorResponse)
    )
)]
pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<Json<DeleteResponse>, HttpAppError> {
    if !state.exchange.delete(&code).await? {
        return Err(AppError::NotFound(code).into());
    }

    Ok(Json(DeleteResponse {
        success: true,
        message: "File deleted successfully".to_string(),
    }))
}
