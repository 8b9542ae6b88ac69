//! Route configuration and setup.
//!
//! Resource routes live in [domains](domains); the health check in [health](health).

mod domains;
mod health;

use crate::api_doc::ApiDoc;
use crate::error::expose_error_details;
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    middleware,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use classhub_core::{Config, StorageBackend};
use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::ServeDir;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

/// Room for multipart boundaries and part headers on top of the configured payload ceiling
const MULTIPART_OVERHEAD_BYTES: u64 = 64 * 1024;

/// Setup all application routes
pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Result<Router<()>, anyhow::Error> {
    let cors = setup_cors(config)?;

    let api_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/api/openapi.json", get(openapi_json))
        .merge(domains::material_routes())
        .merge(domains::video_routes())
        .merge(domains::practice_routes())
        .merge(domains::submission_routes())
        .with_state(state);

    let api_routes = if config.is_production() {
        api_routes
    } else {
        api_routes.layer(middleware::map_response(expose_error_details))
    };

    let app = match serve_local_media(config) {
        Some((prefix, service)) => {
            tracing::info!(prefix = %prefix, "Serving local media files");
            api_routes.nest_service(&prefix, service)
        }
        None => api_routes,
    };

    let http_concurrency_limit = config.server.concurrency_limit.max(1);
    tracing::info!(
        http_concurrency_limit = http_concurrency_limit,
        "HTTP concurrency limit layer enabled"
    );

    let request_timeout = config.server.request_timeout;
    tracing::info!(
        request_timeout_secs = request_timeout.as_secs(),
        "Request timeout layer enabled"
    );

    let body_limit = usize::try_from(
        config
            .limits
            .max_request_size_bytes
            .saturating_add(MULTIPART_OVERHEAD_BYTES),
    )
    .unwrap_or(usize::MAX);

    let app = app
        .nest(
            "/docs",
            utoipa_rapidoc::RapiDoc::new("/api/openapi.json")
                .path("/docs")
                .into(),
        )
        .layer(ConcurrencyLimitLayer::new(http_concurrency_limit))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(DefaultBodyLimit::disable())
        .layer(TimeoutLayer::new(request_timeout))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    Ok(app)
}

async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

/// Local backend objects are served by this process; remote objects by whatever fronts the host.
fn serve_local_media(config: &Config) -> Option<(String, ServeDir)> {
    if config.storage.backend != StorageBackend::Local {
        return None;
    }
    let prefix = config.storage.local.public_prefix.clone();
    if prefix.is_empty() || prefix == "/" {
        tracing::warn!("LOCAL_PUBLIC_PREFIX is empty - stored files are not served");
        return None;
    }
    Some((prefix, ServeDir::new(&config.storage.local.root)))
}

fn setup_cors(config: &Config) -> Result<CorsLayer, anyhow::Error> {
    let methods = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::OPTIONS,
    ];

    let cors = if config.server.cors_origins.iter().any(|o| o == "*") {
        tracing::warn!("CORS configured to allow all origins - not recommended for production");
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any)
    } else {
        let origins = config
            .server
            .cors_origins
            .iter()
            .map(|o| {
                o.parse::<HeaderValue>()
                    .map_err(|_| anyhow::anyhow!("Invalid CORS origin '{}'", o))
            })
            .collect::<Result<Vec<_>, _>>()?;
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(Any)
    };
    Ok(cors)
}
