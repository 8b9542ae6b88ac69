//! Remote file-transfer host backend.
//!
//! Objects live at `<media_root>/<key>` on the host. Every operation opens its own session
//! through [`ConnectionManager`], so no connection outlives a request.

pub mod connection;
pub mod session;
#[cfg(feature = "storage-remote")]
pub mod sftp;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use rand::Rng;

use crate::keys::{validate_key, KeyStrategy};
use crate::retry::RetryPolicy;
use crate::traits::{Storage, StorageError, StorageResult, StoredObject};
use crate::StorageBackend;

pub use connection::ConnectionManager;
pub use session::{mkdir_recursive, RemoteConnector, RemoteSession, ScopedSession, SessionError};

const DIRECTORY_MODE: i32 = 0o755;

impl From<SessionError> for StorageError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotFound => StorageError::NotFound("remote path".to_string()),
            other => StorageError::BackendError(other.to_string()),
        }
    }
}

pub struct RemoteStorage {
    connections: ConnectionManager,
    media_root: String,
    public_prefix: String,
    file_mode: i32,
}

impl RemoteStorage {
    pub fn new(
        connector: Arc<dyn RemoteConnector>,
        media_root: impl Into<String>,
        public_prefix: impl Into<String>,
        file_mode: i32,
        policy: RetryPolicy,
        operation_timeout: Duration,
    ) -> Self {
        Self {
            connections: ConnectionManager::new(connector, policy, operation_timeout),
            media_root: media_root.into().trim_end_matches('/').to_string(),
            public_prefix: public_prefix.into(),
            file_mode,
        }
    }

    fn remote_path(&self, key: &str) -> StorageResult<String> {
        validate_key(key)?;
        Ok(format!("{}/{}", self.media_root, key))
    }
}

fn parent_dir(path: &str) -> &str {
    path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

/// Upload through a temporary sibling so a partially written object is never visible
/// under its final path.
fn put_blocking(
    session: &mut dyn RemoteSession,
    path: &str,
    data: &[u8],
    mode: i32,
) -> StorageResult<()> {
    mkdir_recursive(session, parent_dir(path), DIRECTORY_MODE)?;

    let suffix: u32 = rand::rng().random();
    let temp_path = format!("{}.part-{:08x}", path, suffix);

    let written = session
        .write_file(&temp_path, data, mode)
        .and_then(|()| session.rename(&temp_path, path));
    if let Err(e) = written {
        if let Err(cleanup_err) = session.remove(&temp_path) {
            if !matches!(cleanup_err, SessionError::NotFound) {
                tracing::warn!(
                    error = %cleanup_err,
                    "Failed to remove partial remote upload"
                );
            }
        }
        return Err(StorageError::UploadFailed(e.to_string()));
    }

    if let Err(e) = session.set_mode(path, mode) {
        if let Err(cleanup_err) = session.remove(path) {
            tracing::warn!(
                path = %path,
                error = %cleanup_err,
                storage_leak = true,
                "Failed to remove remote object after permission change failed"
            );
        }
        return Err(StorageError::UploadFailed(format!(
            "Failed to set permissions: {}",
            e
        )));
    }

    Ok(())
}

#[async_trait]
impl Storage for RemoteStorage {
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<StoredObject> {
        let path = self.remote_path(key)?;
        let size = data.len() as u64;
        let mode = self.file_mode;
        let start = std::time::Instant::now();

        self.connections
            .with_session("put", move |session| {
                put_blocking(session, &path, &data, mode)
            })
            .await?;

        tracing::info!(
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Remote storage upload successful"
        );

        Ok(StoredObject {
            key: key.to_string(),
            size_bytes: size,
        })
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let path = self.remote_path(key)?;

        self.connections
            .with_session("delete", move |session| match session.remove(&path) {
                Ok(()) | Err(SessionError::NotFound) => Ok(()),
                Err(e) => Err(StorageError::DeleteFailed(e.to_string())),
            })
            .await?;

        tracing::info!(key = %key, "Remote storage delete successful");
        Ok(())
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let path = self.remote_path(key)?;
        self.connections
            .with_session("exists", move |session| Ok(session.exists(&path)?))
            .await
    }

    async fn mkdir_recursive(&self, dir: &str) -> StorageResult<()> {
        let path = self.remote_path(dir)?;
        self.connections
            .with_session("mkdir", move |session| {
                Ok(mkdir_recursive(session, &path, DIRECTORY_MODE)?)
            })
            .await
    }

    fn key_strategy(&self) -> KeyStrategy {
        KeyStrategy::Timestamped
    }

    fn public_path(&self, key: &str) -> String {
        format!("{}/{}", self.public_prefix.trim_end_matches('/'), key)
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Remote
    }
}

#[cfg(test)]
mod tests {
    use super::session::fake::FakeHost;
    use super::*;
    use classhub_core::Category;
    use std::sync::atomic::Ordering;

    fn storage(host: &FakeHost) -> RemoteStorage {
        RemoteStorage::new(
            Arc::new(host.clone()),
            "/srv/media/",
            "/media",
            0o644,
            RetryPolicy::new(3, Duration::from_millis(1)),
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn test_put_creates_directories_and_sets_mode() {
        let host = FakeHost::new();
        let storage = storage(&host);
        let key = storage.object_key(Category::Presentation, "slides.pdf");
        assert!(key.starts_with("presentations/"));
        assert!(key.ends_with("_slides.pdf"));

        let stored = storage
            .put(&key, Bytes::from_static(b"slides"))
            .await
            .unwrap();
        assert_eq!(stored.size_bytes, 6);

        let (bytes, mode) = host.file(&format!("/srv/media/{}", key)).unwrap();
        assert_eq!(bytes, b"slides");
        assert_eq!(mode, 0o644);
        assert!(storage.exists(&key).await.unwrap());

        let state = host.state.lock().unwrap();
        assert!(state.dirs.contains("/srv/media/presentations"));
        assert_eq!(state.files.len(), 1);
        assert_eq!(state.open_sessions, 0);
    }

    #[tokio::test]
    async fn test_put_never_replaces_an_existing_object() {
        let host = FakeHost::new();
        let storage = storage(&host);
        let first = storage.object_key(Category::Submission, "homework.pdf");
        let second = storage.object_key(Category::Submission, "homework.pdf");
        assert_ne!(first, second);

        storage.put(&first, Bytes::from_static(b"alice")).await.unwrap();
        let err = storage
            .put(&first, Bytes::from_static(b"bob"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::UploadFailed(_)));

        let (bytes, _) = host.file(&format!("/srv/media/{}", first)).unwrap();
        assert_eq!(bytes, b"alice");
        // the rejected temp upload is gone
        assert_eq!(host.state.lock().unwrap().files.len(), 1);
    }

    #[tokio::test]
    async fn test_mode_failure_removes_the_object() {
        let host = FakeHost::new();
        host.state
            .lock()
            .unwrap()
            .failing_modes
            .insert("/srv/media/files/1_a.txt".to_string());
        let storage = storage(&host);

        let err = storage
            .put("files/1_a.txt", Bytes::from_static(b"a"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::UploadFailed(_)));
        assert!(host.state.lock().unwrap().files.is_empty());
    }

    #[tokio::test]
    async fn test_mode_failure_with_stuck_object_still_reports_upload_failure() {
        let host = FakeHost::new();
        {
            let mut state = host.state.lock().unwrap();
            state.failing_modes.insert("/srv/media/files/1_a.txt".to_string());
            state.failing_removes.insert("/srv/media/files/1_a.txt".to_string());
        }
        let storage = storage(&host);

        let err = storage
            .put("files/1_a.txt", Bytes::from_static(b"a"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::UploadFailed(_)));
        assert!(host.file("/srv/media/files/1_a.txt").is_some());
        assert_eq!(host.state.lock().unwrap().open_sessions, 0);
    }

    #[tokio::test]
    async fn test_failed_write_leaves_nothing_reachable() {
        let host = FakeHost::new();
        host.state
            .lock()
            .unwrap()
            .failing_writes
            .insert("/srv/media/videos/1_a.mp4".to_string());
        let storage = storage(&host);

        let err = storage
            .put("videos/1_a.mp4", Bytes::from_static(b"0123456789"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::UploadFailed(_)));
        assert!(!storage.exists("videos/1_a.mp4").await.unwrap());
        assert!(host.state.lock().unwrap().files.is_empty());
    }

    #[tokio::test]
    async fn test_delete_missing_is_ok() {
        let host = FakeHost::new();
        storage(&host).delete("audios/1_gone.mp3").await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_failure_is_reported() {
        let host = FakeHost::new();
        let storage = storage(&host);
        storage
            .put("audios/1_a.mp3", Bytes::from_static(b"mp3"))
            .await
            .unwrap();
        host.state
            .lock()
            .unwrap()
            .failing_removes
            .insert("/srv/media/audios/1_a.mp3".to_string());

        let err = storage.delete("audios/1_a.mp3").await.unwrap_err();
        assert!(matches!(err, StorageError::DeleteFailed(_)));
    }

    #[tokio::test]
    async fn test_mkdir_recursive_is_idempotent() {
        let host = FakeHost::new();
        let storage = storage(&host);
        storage.mkdir_recursive("thumbnails").await.unwrap();
        storage.mkdir_recursive("thumbnails").await.unwrap();

        let (a, b) = tokio::join!(
            storage.mkdir_recursive("files"),
            storage.mkdir_recursive("files")
        );
        assert!(a.is_ok() && b.is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_host_is_backend_unavailable() {
        let host = FakeHost::new();
        host.failing_connects.store(u32::MAX, Ordering::SeqCst);
        let err = storage(&host)
            .put("files/1_a.txt", Bytes::from_static(b"a"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::BackendUnavailable { attempts: 3 }));
        assert_eq!(host.connect_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_rejects_traversal_keys() {
        let host = FakeHost::new();
        let err = storage(&host)
            .put("../etc/passwd", Bytes::from_static(b"x"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidKey(_)));
        assert_eq!(host.connect_calls.load(Ordering::SeqCst), 0);
    }
}
