//! Application state shared by all handlers.

use codedrop_core::Config;
use codedrop_services::{ExchangeService, ExpiringStore, Reaper};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub struct AppState {
    pub config: Config,
    pub exchange: Arc<ExchangeService>,
    /// Same store the exchange uses; read directly only by the health check.
    pub store: Arc<dyn ExpiringStore>,
    pub reaper: Arc<Reaper>,
    /// Cancelled on shutdown; stops the reaper.
    pub shutdown: CancellationToken,
}
