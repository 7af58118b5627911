use anyhow::Context;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use fleetdeck_lib::FleetConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let path = std::env::args().nth(1).map(PathBuf::from);
    let config = FleetConfig::load(path.as_deref()).context("Failed to load configuration")?;

    fleetdeck_lib::run(config).await
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
