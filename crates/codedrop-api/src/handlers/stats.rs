use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;
use axum::{extract::State, Json};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    /// Files that can currently be retrieved.
    pub active_files: usize,
    /// Unix time in milliseconds.
    pub timestamp: i64,
}

#[utoipa::path(
    get,
    path = "/api/stats",
    tag = "system",
    responses(
        (status = 200, description = "Exchange statistics", body = StatsResponse),
        (status = 503, description = "Storage unavailable", body = ErrorResponse)
    )
)]
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StatsResponse>, HttpAppError> {
    let active_files = state.exchange.active_count().await?;
    Ok(Json(StatsResponse {
        active_files,
        timestamp: Utc::now().timestamp_millis(),
    }))
}
