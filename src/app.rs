//! Process startup and shutdown wiring.
//!
//! Connects the configured store, starts the deletion pipeline, and keeps the
//! service alive until Ctrl-C. On shutdown the pipeline is drained before the
//! store is closed.

use crate::application::services::ShortenerService;
use crate::config::Config;
use crate::infrastructure::persistence;

use anyhow::{Context, Result};

/// Connects the store selected by `config` and builds the service on top of it.
///
/// # Errors
///
/// Returns an error if the store cannot be opened or is not reachable.
pub async fn build_service(config: &Config) -> Result<ShortenerService> {
    let repository = persistence::connect(&config.storage)
        .await
        .with_context(|| format!("Failed to open {} storage", config.storage.kind()))?;
    tracing::info!(storage = config.storage.kind(), "Store connected");

    let service = ShortenerService::from_config(repository, config);

    service.ping().await.context("Store health check failed")?;

    Ok(service)
}

/// Runs the service with the given configuration until Ctrl-C.
///
/// Initializes:
/// - Short URL store (memory, file or PostgreSQL)
/// - Deletion pipeline workers
///
/// # Errors
///
/// Returns an error if:
/// - The store cannot be opened
/// - The shutdown signal cannot be installed
pub async fn run(config: Config) -> Result<()> {
    let service = build_service(&config).await?;

    match service.stats().await {
        Ok(stats) => tracing::info!(urls = stats.urls, users = stats.users, "Service ready"),
        Err(e) => tracing::warn!(error = %e, "Failed to read store statistics"),
    }

    let signal = tokio::signal::ctrl_c().await;

    tracing::info!("Shutting down");
    service.shutdown().await;
    tracing::info!("Shutdown complete");

    signal.context("Failed to listen for shutdown signal")
}
