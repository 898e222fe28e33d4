use anyhow::Context;
use db_gateway::config::Config;
use db_gateway::{ConnectionManager, DataGateway};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::from_env().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        e
    })?;

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_new(&config.logging.level)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_ansi(config.logging.style != "never")
        .init();

    let manager = Arc::new(ConnectionManager::new(config.database.clone()));
    manager.connect().await.map_err(|e| {
        error!("Failed to connect: {}", e);
        e
    })?;

    let gateway = DataGateway::new(manager.clone());
    debug!("Query usage:\n{}", DataGateway::query_help());
    match gateway.list_databases("json").await {
        Ok(names) => info!("Gateway ready; visible databases:\n{}", names),
        Err(e) => warn!("Connected, but listing databases failed: {}", e),
    }

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;

    info!("Shutting down");
    manager.disconnect().await?;

    Ok(())
}
