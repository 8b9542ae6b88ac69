//! Health check handler and response type.

use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(5);
const PROBE_KEY: &str = "materials/health-check-non-existent-key";

/// Run an async check with timeout; returns status string "healthy", "timeout", or "{prefix}: {error}".
async fn run_check<F, E>(timeout: Duration, f: F, error_prefix: &str) -> String
where
    F: Future<Output = Result<(), E>>,
    E: Display,
{
    match tokio::time::timeout(timeout, f).await {
        Ok(Ok(())) => "healthy".to_string(),
        Ok(Err(e)) => format!("{}: {}", error_prefix, e),
        Err(_) => "timeout".to_string(),
    }
}

#[derive(serde::Serialize)]
pub(super) struct HealthCheckResponse {
    pub status: String,
    pub metadata: String,
    pub storage: String,
    pub storage_backend: String,
    /// Objects whose cleanup failed since startup
    pub storage_leaks: u64,
}

/// Metadata store and storage backend reachability.
///
/// A failing metadata store makes the service unhealthy (503); a failing storage probe only
/// degrades it, since reads of existing records still work.
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let store = state.db.store.clone();
    let metadata = run_check(TIMEOUT, async move { store.ping().await }, "unhealthy").await;
    let overall_healthy = metadata == "healthy";

    let storage = state.media.storage.clone();
    let storage_status = run_check(
        TIMEOUT,
        async move { storage.exists(PROBE_KEY).await.map(drop) },
        "degraded",
    )
    .await;

    let status = if !overall_healthy {
        "unhealthy"
    } else if storage_status != "healthy" {
        "degraded"
    } else {
        "healthy"
    };

    let response = HealthCheckResponse {
        status: status.to_string(),
        metadata,
        storage: storage_status,
        storage_backend: state.media.storage.backend_type().to_string(),
        storage_leaks: state.media.cleanup().leaked(),
    };

    let status_code = if overall_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(response))
}
