// src/main.rs
use anyhow::Context;
use std::sync::Arc;
use tracing::{error, info};

use survey_bridge::delivery::DeliveryClient;
use survey_bridge::{Bridge, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .json()
        .init();

    info!("🚀 Starting Survey Bridge");

    let config = Config::from_env().context("Failed to load configuration")?;
    info!("AMI endpoint: {}", config.ami.endpoint());

    let notifier = DeliveryClient::new(&config.receiver_base_url, config.delivery_timeout)
        .context("Failed to create receiver client")?;

    let bridge = Bridge::new(config, Arc::new(notifier)).start();
    let shutdown = bridge.shutdown_token();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
            return;
        }
        info!("Shutdown requested");
        shutdown.cancel();
    });

    bridge.wait().await.context("AMI supervisor stopped")?;
    Ok(())
}
