//! Classhub Storage Library
//!
//! Storage abstraction and the two backends that hold uploaded media: the local
//! filesystem and a remote host reached over SFTP.
//!
//! # Storage key format
//!
//! Keys are `<category directory>/<filename>`, relative to the backend root. Keys must not
//! contain `..` or a leading `/`. Key generation is centralized in the `keys` module so
//! all backends stay consistent.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
pub mod remote;
pub mod retry;
pub mod traits;

// Re-export commonly used types
pub use classhub_core::StorageBackend;
pub use factory::create_storage;
pub use keys::{KeyAllocator, KeyStrategy};
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
pub use remote::RemoteStorage;
pub use retry::{retry_with_backoff, RetryPolicy};
pub use traits::{Storage, StorageError, StorageResult, StoredObject};
