//! Request orchestration: intake output in, stored assets and metadata records out.

pub mod cleanup;
pub mod lesson_videos;
pub mod materials;
pub mod orchestrator;
pub mod practices;
pub mod submissions;
#[cfg(test)]
pub(crate) mod testing;
pub mod url_resolver;

use std::future::Future;

use classhub_core::AppError;

/// Run a storage saga on its own task.
///
/// The HTTP request future may be dropped when the client goes away; the spawned task is
/// not, so transfers that already started still end in a commit or a compensation.
pub async fn detached<T, F>(saga: F) -> Result<T, AppError>
where
    T: Send + 'static,
    F: Future<Output = Result<T, AppError>> + Send + 'static,
{
    tokio::spawn(saga)
        .await
        .map_err(|e| AppError::Internal(format!("Upload task failed: {}", e)))?
}
