//! Classhub API Library
//!
//! HTTP surface of the media subsystem: multipart intake, the upload orchestrator and
//! cleanup coordinator, entity handlers and application setup.

// Module declarations
mod api_doc;
mod handlers;
mod telemetry;

// Public modules
pub mod error;
pub mod intake;
pub mod services;
pub mod setup;
pub mod state;

// Re-exports
pub use api_doc::ApiDoc;
pub use error::{ErrorResponse, HttpAppError};
pub use services::cleanup::CleanupCoordinator;
pub use services::orchestrator::MediaOrchestrator;
pub use services::url_resolver::UrlResolver;
pub use state::AppState;
