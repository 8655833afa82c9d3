//! Sensor Node Radio Service - Main Entry Point

use anyhow::Result;
use sensor_node::{init_logging, run, NodeConfig};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args().nth(1);
    let config = NodeConfig::load(config_path.as_deref())?;
    init_logging(&config)?;

    info!("=== Sensor Node v{} ===", env!("CARGO_PKG_VERSION"));
    run(config).await
}
