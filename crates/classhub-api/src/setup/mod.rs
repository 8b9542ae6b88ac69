//! Application setup and initialization
//!
//! Everything `main` needs to go from a loaded `Config` to a ready router, split into
//! steps that tests can call individually.

pub mod database;
pub mod routes;
pub mod server;
pub mod storage;

use crate::state::AppState;
use anyhow::{Context, Result};
use classhub_core::Config;
use std::sync::Arc;

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    // Validate configuration first - fail fast on misconfiguration
    config
        .validate()
        .context("Configuration validation failed")?;

    crate::telemetry::init_telemetry(config.server.log_json)
        .context("Failed to initialize telemetry")?;

    tracing::info!(
        environment = %config.server.environment,
        storage_backend = ?config.storage.backend,
        metadata_backend = ?config.metadata.backend,
        "Configuration loaded and validated successfully"
    );

    let metadata = database::setup_metadata_store(&config).await?;
    let storage = storage::setup_storage(&config).await?;

    let state = Arc::new(AppState::new(config.clone(), storage, metadata));

    let router = routes::setup_routes(&config, state.clone())?;

    Ok((state, router))
}
