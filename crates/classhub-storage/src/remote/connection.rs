use std::sync::Arc;
use std::time::Duration;

use super::session::{RemoteConnector, RemoteSession, ScopedSession, SessionError};
use crate::retry::{retry_with_backoff, RetryPolicy};
use crate::traits::{StorageError, StorageResult};

/// Opens one session per logical operation, retrying connection setup under a bounded
/// policy, and bounds the operation by a timeout.
///
/// The work runs on the blocking pool. If the caller stops waiting (timeout or
/// cancellation) the blocking task still finishes and its session is closed when the task
/// drops it.
#[derive(Clone)]
pub struct ConnectionManager {
    connector: Arc<dyn RemoteConnector>,
    policy: RetryPolicy,
    operation_timeout: Duration,
}

impl ConnectionManager {
    pub fn new(
        connector: Arc<dyn RemoteConnector>,
        policy: RetryPolicy,
        operation_timeout: Duration,
    ) -> Self {
        Self {
            connector,
            policy,
            operation_timeout,
        }
    }

    async fn connect(&self, operation: &str) -> StorageResult<ScopedSession> {
        let connector = self.connector.clone();
        let result = retry_with_backoff(self.policy, operation, |_| {
            let connector = connector.clone();
            async move {
                match tokio::task::spawn_blocking(move || connector.connect()).await {
                    Ok(result) => result,
                    Err(e) => Err(SessionError::Connect(format!("connect task failed: {}", e))),
                }
            }
        })
        .await;

        match result {
            Ok(session) => Ok(ScopedSession::new(session)),
            Err(exhausted) => Err(StorageError::BackendUnavailable {
                attempts: exhausted.attempts,
            }),
        }
    }

    /// Run `work` against a fresh session. The session is released on every exit path.
    pub async fn with_session<T, F>(&self, operation: &'static str, work: F) -> StorageResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn RemoteSession) -> StorageResult<T> + Send + 'static,
    {
        let start = std::time::Instant::now();
        let mut scoped = self.connect(operation).await?;

        let task = tokio::task::spawn_blocking(move || {
            let result = work(scoped.session());
            drop(scoped);
            result
        });

        let result = match tokio::time::timeout(self.operation_timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(StorageError::BackendError(format!(
                "{} task failed: {}",
                operation, join_err
            ))),
            Err(_) => Err(StorageError::Timeout(format!(
                "{} exceeded {}s",
                operation,
                self.operation_timeout.as_secs()
            ))),
        };

        tracing::debug!(
            operation = %operation,
            success = result.is_ok(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Remote session finished"
        );

        result
    }
}
