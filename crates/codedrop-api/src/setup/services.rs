//! Store, exchange service and reaper construction

use crate::state::AppState;
use anyhow::{Context, Result};
use codedrop_core::{Clock, Config};
use codedrop_services::{create_store, ExchangeService, RandomCodeGenerator, Reaper};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub async fn initialize_services(config: &Config, clock: Arc<dyn Clock>) -> Result<Arc<AppState>> {
    let store = create_store(config, clock.clone())
        .await
        .context("Failed to initialize storage")?;

    let exchange_config = config.exchange().clone();
    let codes = Arc::new(RandomCodeGenerator::new(exchange_config.code_format()?));
    let exchange = Arc::new(ExchangeService::new(
        store.clone(),
        codes,
        clock.clone(),
        exchange_config,
    )?);

    let reaper = Arc::new(Reaper::new(store.clone(), clock, config.reaper_interval()));

    tracing::info!(
        storage_backend = %store.backend_type(),
        ttl_secs = config.ttl().as_secs(),
        max_upload_mb = config.exchange().max_size_mb(),
        code_length = config.exchange().code_length,
        "Exchange services initialized"
    );

    Ok(Arc::new(AppState {
        config: config.clone(),
        exchange,
        store,
        reaper,
        shutdown: CancellationToken::new(),
    }))
}
