use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use classhub_core::AppError;
use serde_json::Value;
use uuid::Uuid;

use crate::store::{body_version, MetadataStore, UpdateOutcome};

#[derive(Default)]
struct Records {
    next_seq: u64,
    rows: HashMap<(String, Uuid), (u64, Value)>,
}

/// Process-local metadata store for development and tests
#[derive(Clone, Default)]
pub struct InMemoryMetadataStore {
    inner: Arc<Mutex<Records>>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> Result<MutexGuard<'_, Records>, AppError> {
        self.inner
            .lock()
            .map_err(|_| AppError::Internal("metadata store lock poisoned".to_string()))
    }

    fn sorted(records: &Records, mut keep: impl FnMut(&str, &Value) -> bool) -> Vec<Value> {
        let mut rows: Vec<_> = records
            .rows
            .iter()
            .filter(|((collection, _), (_, body))| keep(collection, body))
            .map(|(_, (seq, body))| (*seq, body.clone()))
            .collect();
        rows.sort_by(|a, b| b.0.cmp(&a.0));
        rows.into_iter().map(|(_, body)| body).collect()
    }

    /// Number of records in a collection
    pub fn count(&self, collection: &str) -> usize {
        self.inner
            .lock()
            .map(|r| r.rows.keys().filter(|(c, _)| c == collection).count())
            .unwrap_or(0)
    }
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn create(&self, collection: &str, id: Uuid, body: Value) -> Result<(), AppError> {
        let mut records = self.records()?;
        let key = (collection.to_string(), id);
        if records.rows.contains_key(&key) {
            return Err(AppError::Internal(format!(
                "duplicate record {} in {}",
                id, collection
            )));
        }
        records.next_seq += 1;
        let seq = records.next_seq;
        records.rows.insert(key, (seq, body));
        Ok(())
    }

    async fn find_by_id(&self, collection: &str, id: Uuid) -> Result<Option<Value>, AppError> {
        let records = self.records()?;
        Ok(records
            .rows
            .get(&(collection.to_string(), id))
            .map(|(_, body)| body.clone()))
    }

    async fn update(
        &self,
        collection: &str,
        id: Uuid,
        expected_version: u64,
        body: Value,
    ) -> Result<UpdateOutcome, AppError> {
        let mut records = self.records()?;
        match records.rows.get_mut(&(collection.to_string(), id)) {
            Some(row) if body_version(&row.1) != expected_version => Ok(UpdateOutcome::Stale),
            Some(row) => {
                row.1 = body;
                Ok(UpdateOutcome::Updated)
            }
            None => Ok(UpdateOutcome::Missing),
        }
    }

    async fn delete(&self, collection: &str, id: Uuid) -> Result<bool, AppError> {
        let mut records = self.records()?;
        Ok(records.rows.remove(&(collection.to_string(), id)).is_some())
    }

    async fn list(&self, collection: &str) -> Result<Vec<Value>, AppError> {
        let records = self.records()?;
        Ok(Self::sorted(&records, |c, _| c == collection))
    }

    async fn find_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<Vec<Value>, AppError> {
        let records = self.records()?;
        Ok(Self::sorted(&records, |c, body| {
            c == collection && body.get(field).and_then(Value::as_str) == Some(value)
        }))
    }

    async fn ping(&self) -> Result<(), AppError> {
        self.records().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_crud_cycle() {
        let store = InMemoryMetadataStore::new();
        let id = Uuid::new_v4();

        store
            .create("materials", id, json!({"title": "Intro"}))
            .await
            .unwrap();
        assert_eq!(
            store.find_by_id("materials", id).await.unwrap().unwrap()["title"],
            "Intro"
        );
        assert!(store.find_by_id("videos", id).await.unwrap().is_none());

        assert_eq!(
            store
                .update("materials", id, 0, json!({"title": "Outro", "version": 1}))
                .await
                .unwrap(),
            UpdateOutcome::Updated
        );
        assert_eq!(
            store
                .update("materials", Uuid::new_v4(), 0, json!({}))
                .await
                .unwrap(),
            UpdateOutcome::Missing
        );

        assert!(store.delete("materials", id).await.unwrap());
        assert!(!store.delete("materials", id).await.unwrap());
        assert_eq!(store.count("materials"), 0);
    }

    #[tokio::test]
    async fn test_update_against_old_revision_is_stale() {
        let store = InMemoryMetadataStore::new();
        let id = Uuid::new_v4();
        store
            .create("lesson_videos", id, json!({"audios": ["x"]}))
            .await
            .unwrap();

        // two writers both read revision 0
        let first = store
            .update("lesson_videos", id, 0, json!({"audios": [], "version": 1}))
            .await
            .unwrap();
        let second = store
            .update("lesson_videos", id, 0, json!({"audios": ["x", "y"], "version": 1}))
            .await
            .unwrap();

        assert_eq!(first, UpdateOutcome::Updated);
        assert_eq!(second, UpdateOutcome::Stale);
        let stored = store.find_by_id("lesson_videos", id).await.unwrap().unwrap();
        assert_eq!(stored["audios"], json!([]));
        assert_eq!(body_version(&stored), 1);
    }

    #[tokio::test]
    async fn test_list_newest_first_and_filter() {
        let store = InMemoryMetadataStore::new();
        let video = Uuid::new_v4().to_string();
        for n in 0..3 {
            let video_id = if n == 1 { "other".to_string() } else { video.clone() };
            store
                .create("video_works", Uuid::new_v4(), json!({"n": n, "videoId": video_id}))
                .await
                .unwrap();
        }

        let all = store.list("video_works").await.unwrap();
        let order: Vec<_> = all.iter().map(|v| v["n"].as_i64().unwrap()).collect();
        assert_eq!(order, vec![2, 1, 0]);

        let matching = store
            .find_by_field("video_works", "videoId", &video)
            .await
            .unwrap();
        assert_eq!(matching.len(), 2);
    }
}
