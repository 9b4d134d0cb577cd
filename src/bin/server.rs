//! Rebalancer server: runs the scheduled swap-decision loop for every
//! enabled bot. Headless — no HTTP surface of its own. Metrics are
//! pushed as structured JSON to stdout (see `infrastructure::observability`).
//!
//! # Environment Variables
//! See `config::exchange_config`, `config::runtime_config`, and
//! `config::observability_config` for the full list and their defaults.

use anyhow::Result;
use rebalancer::application::system::Application;
use rebalancer::config::Config;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "rebalancer starting");

    let config = Config::from_env();
    info!(
        database_url = %config.runtime.database_url,
        simulate_trades = config.runtime.simulate_trades,
        "configuration loaded"
    );

    let app = Arc::new(Application::build(config).await?);
    app.start().await?;
    info!("all enabled bot schedules started; press Ctrl+C to stop");

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    app.shutdown().await?;

    Ok(())
}
