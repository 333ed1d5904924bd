//! TaskBazar Server
//!
//! Points, campaigns and referrals over HTTP

use std::sync::Arc;

use anyhow::Context;
use taskbazar::{auth, server, store, Config, TaskBazar};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting TaskBazar Server");

    let config = Config::load().context("Failed to load configuration")?;

    let store = store::open_store(&config.store)?;
    let verifier = auth::verifier_from_config(&config)?;
    info!("Application namespace: {}", config.store.app_id);

    let bazar = Arc::new(TaskBazar::new(store, &config.store.app_id));
    let state = server::AppState::new(bazar, verifier);

    server::run_server(&config.server.host, config.server.port, state).await?;

    Ok(())
}
