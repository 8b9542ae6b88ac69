//! Transfers a validated batch to the storage backend.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use classhub_core::{AppError, Asset};
use classhub_storage::{KeyAllocator, Storage};
use futures::stream::{self, StreamExt};

use super::cleanup::{CleanupCoordinator, TransferLedger};
use super::url_resolver::UrlResolver;
use crate::error::storage_app_error;
use crate::intake::FilePart;

/// Assets of a batch that is fully stored but not yet referenced by metadata.
///
/// Finish with `commit` once the metadata write succeeded, `rollback` otherwise.
pub struct StagedBatch {
    pub assets: Vec<Asset>,
    ledger: TransferLedger,
}

impl StagedBatch {
    pub fn commit(self) {
        self.ledger.commit();
    }

    pub async fn rollback(self) {
        self.ledger.rollback().await;
    }

    /// Run the metadata write; compensate the batch if it fails.
    pub async fn persist_with<T, F>(self, write: F) -> Result<T, AppError>
    where
        F: Future<Output = Result<T, AppError>>,
    {
        match write.await {
            Ok(value) => {
                self.commit();
                Ok(value)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Metadata write failed after upload, compensating");
                self.rollback().await;
                Err(e)
            }
        }
    }
}

#[derive(Clone)]
pub struct MediaOrchestrator {
    storage: Arc<dyn Storage>,
    resolver: UrlResolver,
    cleanup: CleanupCoordinator,
    concurrency: usize,
}

impl MediaOrchestrator {
    pub fn new(
        storage: Arc<dyn Storage>,
        resolver: UrlResolver,
        cleanup: CleanupCoordinator,
        concurrency: usize,
    ) -> Self {
        Self {
            storage,
            resolver,
            cleanup,
            concurrency: concurrency.max(1),
        }
    }

    pub fn cleanup(&self) -> &CleanupCoordinator {
        &self.cleanup
    }

    /// Store every part. Assets come back in the order of `parts`.
    ///
    /// All keys are recorded in the ledger before the first transfer starts. If any transfer
    /// fails, every recorded key receives a compensating delete and the first error is
    /// returned.
    pub async fn stage(
        &self,
        parts: Vec<FilePart>,
        host: Option<&str>,
    ) -> Result<StagedBatch, AppError> {
        let mut ledger = self.cleanup.ledger();
        let mut allocator = KeyAllocator::new();

        let planned: Vec<(String, FilePart)> = parts
            .into_iter()
            .map(|part| {
                let key = allocator.allocate(
                    self.storage
                        .object_key(part.category, &part.original_name),
                );
                ledger.record(&key);
                (key, part)
            })
            .collect();

        let started = Instant::now();
        let mut results: Vec<(usize, Result<Asset, AppError>)> =
            stream::iter(planned.into_iter().enumerate())
                .map(|(index, (key, part))| {
                    let storage = self.storage.clone();
                    async move {
                        let result = storage
                            .put(&key, part.bytes.clone())
                            .await
                            .map(|stored| (key, part, stored.size_bytes))
                            .map_err(storage_app_error);
                        (index, result)
                    }
                })
                .buffer_unordered(self.concurrency)
                .map(|(index, result)| {
                    let asset = result.map(|(key, part, size_bytes)| Asset {
                        category: part.category,
                        public_url: self
                            .resolver
                            .resolve(host, &self.storage.public_path(&key)),
                        stored_path: key,
                        original_filename: part.original_name,
                        size_bytes,
                        mime_type: part.mime_type,
                        created_at: Utc::now(),
                    });
                    (index, asset)
                })
                .collect()
                .await;
        results.sort_by_key(|(index, _)| *index);

        let mut assets = Vec::with_capacity(results.len());
        let mut first_error = None;
        for (_, result) in results {
            match result {
                Ok(asset) => {
                    ledger.mark_stored(&asset.stored_path);
                    assets.push(asset);
                }
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        if let Some(err) = first_error {
            tracing::warn!(
                transfers = ledger.len(),
                stored = assets.len(),
                error = %err,
                "Upload batch failed, compensating"
            );
            ledger.rollback().await;
            return Err(err);
        }

        tracing::info!(
            transfers = assets.len(),
            bytes = assets.iter().map(|a| a.size_bytes).sum::<u64>(),
            duration_ms = started.elapsed().as_millis() as u64,
            backend = ?self.storage.backend_type(),
            "Upload batch stored"
        );

        Ok(StagedBatch { assets, ledger })
    }
}
