//! Storage setup and initialization

use anyhow::{Context, Result};
use classhub_core::{Config, StorageBackend};
use classhub_storage::{create_storage, Storage};
use std::sync::Arc;

pub async fn setup_storage(config: &Config) -> Result<Arc<dyn Storage>> {
    tracing::info!("Initializing storage backend...");
    let storage = create_storage(&config.storage)
        .await
        .context("Failed to initialize storage backend")?;

    match storage.backend_type() {
        StorageBackend::Local => tracing::info!(
            root = %config.storage.local.root.display(),
            public_prefix = %config.public_prefix(),
            "Local storage initialized"
        ),
        // host and credentials stay out of the logs
        StorageBackend::Remote => tracing::info!(
            public_prefix = %config.public_prefix(),
            operation_timeout_secs = config.storage.operation_timeout.as_secs(),
            "Remote storage initialized"
        ),
    }

    Ok(storage)
}
