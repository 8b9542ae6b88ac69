//! Classhub Core Library
//!
//! Domain models, error types and configuration shared by the storage, metadata and
//! HTTP crates.

pub mod config;
pub mod error;
pub mod models;
pub mod storage_types;

// Re-export commonly used types
pub use config::{
    Config, DomainRule, LocalStorageConfig, MetadataBackend, MetadataConfig, PublicUrlConfig,
    RemoteAuth, RemoteStorageConfig, RetrySettings, ServerConfig, StorageBackendConfig,
    UploadLimits,
};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use models::{Asset, AssetState, Category, OwnsAssets};
pub use storage_types::StorageBackend;
