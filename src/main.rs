/// modvault server entry point
///
/// Reads configuration from MODVAULT_* environment variables and serves:
/// - Marketplace API at /api/*
/// - Health check at /healthz

use modvault::{config::Config, server::start_server};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();

    start_server(config).await?;

    Ok(())
}
