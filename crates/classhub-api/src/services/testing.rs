//! Metadata store double for exercising concurrent read-modify-write cycles.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use classhub_core::{AppError, Config};
use classhub_db::store::body_version;
use classhub_db::{InMemoryMetadataStore, MetadataStore, UpdateOutcome};
use classhub_storage::Storage;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::state::AppState;

type Interference = Box<dyn FnOnce(&mut Value) + Send>;

/// Lands a queued foreign write between a request's read and its own write.
#[derive(Default)]
pub struct InterleavingStore {
    inner: InMemoryMetadataStore,
    pending: Mutex<VecDeque<Interference>>,
}

impl InterleavingStore {
    /// Queue a change that another request commits right before the next update.
    pub fn interfere(&self, change: impl FnOnce(&mut Value) + Send + 'static) {
        self.pending.lock().unwrap().push_back(Box::new(change));
    }
}

#[async_trait]
impl MetadataStore for InterleavingStore {
    async fn create(&self, collection: &str, id: Uuid, body: Value) -> Result<(), AppError> {
        self.inner.create(collection, id, body).await
    }

    async fn find_by_id(&self, collection: &str, id: Uuid) -> Result<Option<Value>, AppError> {
        self.inner.find_by_id(collection, id).await
    }

    async fn update(
        &self,
        collection: &str,
        id: Uuid,
        expected_version: u64,
        body: Value,
    ) -> Result<UpdateOutcome, AppError> {
        let foreign = self.pending.lock().unwrap().pop_front();
        if let Some(change) = foreign {
            let mut current = self.inner.find_by_id(collection, id).await?.unwrap();
            let version = body_version(&current);
            change(&mut current);
            current["version"] = json!(version + 1);
            self.inner.update(collection, id, version, current).await?;
        }
        self.inner
            .update(collection, id, expected_version, body)
            .await
    }

    async fn delete(&self, collection: &str, id: Uuid) -> Result<bool, AppError> {
        self.inner.delete(collection, id).await
    }

    async fn list(&self, collection: &str) -> Result<Vec<Value>, AppError> {
        self.inner.list(collection).await
    }

    async fn find_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<Vec<Value>, AppError> {
        self.inner.find_by_field(collection, field, value).await
    }

    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}

pub fn state_over(store: Arc<dyn MetadataStore>, storage: Arc<dyn Storage>) -> Arc<AppState> {
    let config =
        Config::from_lookup(|key| (key == "METADATA_BACKEND").then(|| "memory".to_string()))
            .unwrap();
    Arc::new(AppState::new(config, storage, store))
}
