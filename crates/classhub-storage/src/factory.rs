#[cfg(feature = "storage-local")]
use crate::LocalStorage;
#[cfg(feature = "storage-remote")]
use crate::remote::{sftp::SftpConnector, RemoteStorage};
use crate::{Storage, StorageBackend, StorageError, StorageResult};
use classhub_core::StorageBackendConfig;
use std::sync::Arc;

/// Create a storage backend based on configuration
pub async fn create_storage(config: &StorageBackendConfig) -> StorageResult<Arc<dyn Storage>> {
    match config.backend {
        #[cfg(feature = "storage-local")]
        StorageBackend::Local => {
            let storage =
                LocalStorage::new(&config.local.root, config.local.public_prefix.clone()).await?;
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-local"))]
        StorageBackend::Local => Err(StorageError::ConfigError(
            "Local storage backend not available (storage-local feature not enabled)".to_string(),
        )),

        #[cfg(feature = "storage-remote")]
        StorageBackend::Remote => {
            let remote = config.remote.as_ref().ok_or_else(|| {
                StorageError::ConfigError("Remote storage settings not configured".to_string())
            })?;

            let connector = SftpConnector::new(
                remote.host.clone(),
                remote.port,
                remote.username.clone(),
                remote.auth.clone(),
                remote.connect_timeout,
            );

            let storage = RemoteStorage::new(
                Arc::new(connector),
                remote.media_root.clone(),
                remote.public_prefix.clone(),
                remote.file_mode,
                remote.retry.into(),
                config.operation_timeout,
            );
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-remote"))]
        StorageBackend::Remote => Err(StorageError::ConfigError(
            "Remote storage backend not available (storage-remote feature not enabled)".to_string(),
        )),
    }
}

#[cfg(all(test, feature = "storage-local"))]
mod tests {
    use super::*;
    use classhub_core::LocalStorageConfig;
    use std::time::Duration;

    #[tokio::test]
    async fn test_creates_local_backend() {
        let dir = tempfile::tempdir().unwrap();
        let config = StorageBackendConfig {
            backend: StorageBackend::Local,
            local: LocalStorageConfig {
                root: dir.path().to_path_buf(),
                public_prefix: "/media".to_string(),
            },
            remote: None,
            operation_timeout: Duration::from_secs(5),
        };

        let storage = create_storage(&config).await.unwrap();
        assert_eq!(storage.backend_type(), StorageBackend::Local);
        assert_eq!(storage.public_path("files/a.txt"), "/media/files/a.txt");
    }

    #[tokio::test]
    async fn test_remote_without_settings_is_config_error() {
        let config = StorageBackendConfig {
            backend: StorageBackend::Remote,
            local: LocalStorageConfig {
                root: "./unused".into(),
                public_prefix: "/media".to_string(),
            },
            remote: None,
            operation_timeout: Duration::from_secs(5),
        };

        let result = create_storage(&config).await;
        assert!(matches!(result, Err(StorageError::ConfigError(_))));
    }
}
