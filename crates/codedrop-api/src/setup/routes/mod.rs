//! Route configuration and setup.
//!
//! Exchange routes are registered here; health checks live in [health](health).

mod health;

use crate::constants::{API_PREFIX, MULTIPART_OVERHEAD_BYTES};
use crate::handlers;
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    routing::{delete, get, post},
    Json, Router,
};
use codedrop_core::Config;
use codedrop_infra::{request_id_middleware, security_headers_middleware, SecurityHeaders};
use health::health_check;
use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Setup all application routes
pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Result<Router<()>, anyhow::Error> {
    let cors = setup_cors(config)?;

    let body_limit = config
        .max_upload_size_bytes()
        .saturating_add(MULTIPART_OVERHEAD_BYTES);
    let body_limit = usize::try_from(body_limit).unwrap_or(usize::MAX);

    tracing::info!(
        max_concurrent_requests = config.max_concurrent_requests(),
        body_limit_bytes = body_limit,
        "HTTP limits configured"
    );

    let app = exchange_routes()
        .route("/health", get(health_check))
        .route(
            "/api/openapi.json",
            get(|| async { Json(crate::api_doc::get_openapi_spec()) }),
        )
        // Upload bodies are streamed; the exchange service enforces the file size limit.
        // Requests past the body limit fail inside the multipart reader as a JSON 413.
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(ConcurrencyLimitLayer::new(config.max_concurrent_requests()))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(axum::middleware::from_fn_with_state(
            SecurityHeaders::for_environment(config.is_production()),
            security_headers_middleware,
        ))
        .with_state(state);

    Ok(app)
}

fn exchange_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            &format!("{}/upload", API_PREFIX),
            post(handlers::upload::upload_file),
        )
        .route(
            &format!("{}/file/{{code}}/info", API_PREFIX),
            get(handlers::file_info::get_file_info),
        )
        .route(
            &format!("{}/file/{{code}}", API_PREFIX),
            delete(handlers::file_delete::delete_file),
        )
        .route(
            &format!("{}/download/{{code}}", API_PREFIX),
            get(handlers::download::download_file),
        )
        .route(
            &format!("{}/stats", API_PREFIX),
            get(handlers::stats::get_stats),
        )
}

/// Setup CORS configuration
fn setup_cors(config: &Config) -> Result<CorsLayer, anyhow::Error> {
    let methods = [Method::GET, Method::POST, Method::DELETE, Method::OPTIONS];

    let cors = if config.cors_origins().iter().any(|o| o == "*") {
        tracing::warn!("CORS configured to allow all origins - not recommended for production");
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any)
    } else {
        let origins = config
            .cors_origins()
            .iter()
            .map(|o| {
                o.parse::<HeaderValue>()
                    .map_err(|e| anyhow::anyhow!("Invalid CORS origin {:?}: {}", o, e))
            })
            .collect::<Result<Vec<_>, _>>()?;

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(Any)
    };
    Ok(cors)
}
