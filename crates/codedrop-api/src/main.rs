use codedrop_api::setup;
use codedrop_core::Config;

// Use mimalloc as the global allocator for better performance and lower fragmentation,
// especially when running on musl-based systems inside containers.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = Config::from_env()?;

    let (state, router) = setup::initialize_app(config.clone()).await?;

    let reaper = state.reaper.clone().start(state.shutdown.clone());

    setup::server::start_server(&config, router, state.shutdown.clone()).await?;

    state.shutdown.cancel();
    reaper.await?;
    codedrop_infra::shutdown_telemetry().await;

    Ok(())
}
