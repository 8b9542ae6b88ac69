//! Storage abstraction trait
//!
//! This module defines the Storage trait that all storage backends must implement.

use crate::keys::KeyStrategy;
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use classhub_core::Category;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("Storage backend unavailable after {attempts} connection attempts")]
    BackendUnavailable { attempts: u32 },

    #[error("Storage operation timed out: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// An object that `put` confirmed as fully written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub key: String,
    pub size_bytes: u64,
}

/// Storage abstraction trait
///
/// Keys are relative paths of the form `<category directory>/<filename>`; they never contain
/// `..` or a leading `/`. Every backend resolves a key below its own root.
///
/// `put` is atomic for the caller: the object is either fully reachable under `key` when it
/// returns `Ok`, or nothing is reachable. `delete` of a missing object succeeds.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Write `data` under `key`, creating parent directories as needed
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<StoredObject>;

    /// Remove the object under `key`; missing objects are not an error
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Check if an object exists
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Create `dir` and all of its parents. Succeeds if the directory already exists,
    /// including when another writer created it concurrently.
    async fn mkdir_recursive(&self, dir: &str) -> StorageResult<()>;

    /// Key naming scheme used for new objects on this backend
    fn key_strategy(&self) -> KeyStrategy;

    /// Build a fresh key for an upload of `original_name` in `category`
    fn object_key(&self, category: Category, original_name: &str) -> String {
        self.key_strategy().generate(category, original_name)
    }

    /// URL path (without scheme or host) under which `key` is served, e.g. `/media/videos/x.mp4`
    fn public_path(&self, key: &str) -> String;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}
