//! Application setup and initialization

pub mod routes;
pub mod server;
pub mod services;

use crate::state::AppState;
use anyhow::{Context, Result};
use codedrop_core::{Config, SystemClock};
use std::sync::Arc;

/// Initialize the entire application. The reaper is built but not started.
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    config
        .validate()
        .context("Configuration validation failed")?;

    codedrop_infra::init_telemetry(config.log_format(), config.environment())
        .context("Failed to initialize telemetry")?;

    tracing::info!("Configuration loaded and validated successfully");

    let state = services::initialize_services(&config, Arc::new(SystemClock)).await?;
    let router = routes::setup_routes(&config, state.clone())?;

    Ok((state, router))
}
