//! Compensating deletes.
//!
//! Storage writes and metadata writes are not transactional. This module keeps the two
//! consistent after the fact: a [`TransferLedger`] tracks every key a request writes and
//! either commits it or deletes it again, and [`CleanupCoordinator`] removes the bytes of
//! replaced assets and deleted entities. Delete failures are logged with a
//! `storage_leak` marker and counted; they never fail the request.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use classhub_core::{Asset, AssetState, OwnsAssets};
use classhub_storage::Storage;
use futures::future::join_all;

#[derive(Clone)]
pub struct CleanupCoordinator {
    storage: Arc<dyn Storage>,
    leaked: Arc<AtomicU64>,
}

impl CleanupCoordinator {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            leaked: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Objects whose delete failed since startup
    pub fn leaked(&self) -> u64 {
        self.leaked.load(Ordering::Relaxed)
    }

    pub fn ledger(&self) -> TransferLedger {
        TransferLedger {
            coordinator: self.clone(),
            entries: Vec::new(),
            armed: true,
        }
    }

    /// Delete every key concurrently. Returns how many deletes failed.
    pub async fn delete_keys(&self, keys: Vec<String>, reason: &'static str) -> usize {
        let deletes = keys.into_iter().map(|key| {
            let storage = self.storage.clone();
            let leaked = self.leaked.clone();
            async move {
                match storage.delete(&key).await {
                    Ok(()) => {
                        tracing::debug!(key = %key, reason, "Deleted stored object");
                        true
                    }
                    Err(e) => {
                        leaked.fetch_add(1, Ordering::Relaxed);
                        tracing::warn!(
                            key = %key,
                            reason,
                            error = %e,
                            storage_leak = true,
                            "Failed to delete stored object"
                        );
                        false
                    }
                }
            }
        });

        join_all(deletes).await.into_iter().filter(|ok| !ok).count()
    }

    /// Remove the bytes of assets that a committed metadata update no longer references.
    pub async fn release_replaced(&self, replaced: Vec<Asset>) {
        if replaced.is_empty() {
            return;
        }
        let keys = replaced.into_iter().map(|a| a.stored_path).collect();
        self.delete_keys(keys, "replaced").await;
    }

    /// Remove the bytes of every asset of an entity whose record is already gone.
    pub async fn delete_owned<T: OwnsAssets>(&self, entity: &T) {
        let keys: Vec<String> = entity
            .owned_assets()
            .into_iter()
            .map(|a| a.stored_path.clone())
            .collect();
        let total = keys.len();
        let failed = self.delete_keys(keys, "entity_deleted").await;
        if failed > 0 {
            tracing::warn!(total, failed, "Entity removed with undeleted assets");
        }
    }
}

#[derive(Debug)]
struct LedgerEntry {
    key: String,
    state: AssetState,
}

/// Keys written by one request.
///
/// Keys are recorded as `Pending` before their transfer starts. A ledger is finished with
/// [`commit`](Self::commit) or [`rollback`](Self::rollback); one that is dropped unfinished
/// (the request future was abandoned) schedules deletion of everything it recorded.
pub struct TransferLedger {
    coordinator: CleanupCoordinator,
    entries: Vec<LedgerEntry>,
    armed: bool,
}

impl TransferLedger {
    pub fn record(&mut self, key: &str) {
        self.entries.push(LedgerEntry {
            key: key.to_string(),
            state: AssetState::Pending,
        });
    }

    fn transition(&mut self, key: &str, next: AssetState) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.key == key) {
            debug_assert!(entry.state.can_transition_to(next));
            entry.state = next;
        }
    }

    pub fn mark_stored(&mut self, key: &str) {
        self.transition(key, AssetState::Stored);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Metadata now references the stored keys; nothing is deleted.
    pub fn commit(mut self) {
        self.armed = false;
        tracing::debug!(
            stored = self
                .entries
                .iter()
                .filter(|e| e.state == AssetState::Stored)
                .count(),
            "Transfer ledger committed"
        );
    }

    /// Delete every recorded key, stored or not.
    pub async fn rollback(mut self) {
        self.armed = false;
        let keys: Vec<String> = self.entries.iter().map(|e| e.key.clone()).collect();
        let failed = self.coordinator.delete_keys(keys, "rollback").await;

        for entry in &mut self.entries {
            let next = match entry.state {
                AssetState::Stored => AssetState::Deleted,
                _ => AssetState::Discarded,
            };
            debug_assert!(entry.state.can_transition_to(next));
            entry.state = next;
        }
        tracing::info!(
            transfers = self.entries.len(),
            failed,
            "Rolled back upload batch"
        );
    }
}

impl Drop for TransferLedger {
    fn drop(&mut self) {
        if !self.armed || self.entries.is_empty() {
            return;
        }
        let keys: Vec<String> = self.entries.drain(..).map(|e| e.key).collect();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                tracing::warn!(
                    transfers = keys.len(),
                    "Upload abandoned before commit, scheduling cleanup"
                );
                let coordinator = self.coordinator.clone();
                handle.spawn(async move {
                    coordinator.delete_keys(keys, "abandoned").await;
                });
            }
            Err(_) => {
                self.coordinator
                    .leaked
                    .fetch_add(keys.len() as u64, Ordering::Relaxed);
                tracing::warn!(
                    keys = ?keys,
                    storage_leak = true,
                    "Upload abandoned outside a runtime, objects left behind"
                );
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::MemoryStorage;
    use super::*;
    use bytes::Bytes;
    use chrono::Utc;
    use classhub_core::models::Material;
    use classhub_core::models::MaterialContent;
    use classhub_core::Category;
    use uuid::Uuid;

    fn asset(category: Category, key: &str) -> Asset {
        Asset {
            category,
            stored_path: key.to_string(),
            public_url: format!("http://localhost/media/{}", key),
            original_filename: key.to_string(),
            size_bytes: 1,
            mime_type: "application/pdf".to_string(),
            created_at: Utc::now(),
        }
    }

    async fn seeded(keys: &[&str]) -> Arc<MemoryStorage> {
        let storage = Arc::new(MemoryStorage::default());
        for key in keys {
            storage.put(key, Bytes::from_static(b"x")).await.unwrap();
        }
        storage
    }

    #[tokio::test]
    async fn test_rollback_deletes_every_recorded_key() {
        let storage = seeded(&["files/a.pdf", "files/b.pdf"]).await;
        let coordinator = CleanupCoordinator::new(storage.clone());

        let mut ledger = coordinator.ledger();
        for key in ["files/a.pdf", "files/b.pdf", "files/c.pdf"] {
            ledger.record(key);
        }
        ledger.mark_stored("files/a.pdf");
        ledger.mark_stored("files/b.pdf");
        ledger.rollback().await;

        assert!(storage.keys().is_empty());
        let mut deleted = storage.deleted.lock().unwrap().clone();
        deleted.sort();
        assert_eq!(deleted, vec!["files/a.pdf", "files/b.pdf", "files/c.pdf"]);
    }

    #[tokio::test]
    async fn test_commit_keeps_objects() {
        let storage = seeded(&["files/a.pdf"]).await;
        let coordinator = CleanupCoordinator::new(storage.clone());

        let mut ledger = coordinator.ledger();
        ledger.record("files/a.pdf");
        ledger.mark_stored("files/a.pdf");
        ledger.commit();

        tokio::task::yield_now().await;
        assert_eq!(storage.keys(), vec!["files/a.pdf"]);
        assert!(storage.deleted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dropped_ledger_schedules_cleanup() {
        let storage = seeded(&["files/a.pdf"]).await;
        let coordinator = CleanupCoordinator::new(storage.clone());

        {
            let mut ledger = coordinator.ledger();
            ledger.record("files/a.pdf");
            ledger.mark_stored("files/a.pdf");
        }

        for _ in 0..50 {
            if storage.keys().is_empty() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(storage.keys().is_empty());
    }

    #[tokio::test]
    async fn test_delete_owned_attempts_every_asset() {
        let storage = seeded(&["materials/a.pdf", "thumbnails/a.png"]).await;
        storage.fail_delete_of("materials/");
        let coordinator = CleanupCoordinator::new(storage.clone());

        let now = Utc::now();
        let material = Material {
            id: Uuid::new_v4(),
            title: "Intro".to_string(),
            description: "d".to_string(),
            content: MaterialContent::File,
            file_url: String::new(),
            file_type: "pdf".to_string(),
            file: Some(asset(Category::Material, "materials/a.pdf")),
            thumbnail_url: String::new(),
            thumbnail: Some(asset(Category::Thumbnail, "thumbnails/a.png")),
            version: 0,
            created_at: now,
            updated_at: now,
        };

        coordinator.delete_owned(&material).await;

        assert_eq!(storage.deleted.lock().unwrap().len(), 2);
        assert_eq!(storage.keys(), vec!["materials/a.pdf"]);
        assert_eq!(coordinator.leaked(), 1);
    }

    #[tokio::test]
    async fn test_release_replaced_counts_leaks() {
        let storage = seeded(&["thumbnails/old.png"]).await;
        storage.fail_delete_of("old");
        let coordinator = CleanupCoordinator::new(storage.clone());

        coordinator
            .release_replaced(vec![asset(Category::Thumbnail, "thumbnails/old.png")])
            .await;
        assert_eq!(coordinator.leaked(), 1);
    }
}
