//! Typed access to entity records.

use std::marker::PhantomData;
use std::sync::Arc;

use classhub_core::models::{LessonVideo, Material, Practice, PracticeWork, VideoWork};
use classhub_core::AppError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::store::{MetadataStore, UpdateOutcome};

/// A document type persisted in its own collection
pub trait Entity: Serialize + DeserializeOwned + Send + Sync {
    const COLLECTION: &'static str;
    /// Human-readable name used in not-found messages
    const NAME: &'static str;

    fn id(&self) -> Uuid;
}

/// An entity that is modified in place and guarded against lost updates
pub trait Versioned: Entity {
    fn version(&self) -> u64;

    fn set_version(&mut self, version: u64);
}

impl Entity for Material {
    const COLLECTION: &'static str = "materials";
    const NAME: &'static str = "Material";

    fn id(&self) -> Uuid {
        self.id
    }
}

impl Entity for LessonVideo {
    const COLLECTION: &'static str = "lesson_videos";
    const NAME: &'static str = "Video";

    fn id(&self) -> Uuid {
        self.id
    }
}

impl Versioned for Material {
    fn version(&self) -> u64 {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

impl Versioned for LessonVideo {
    fn version(&self) -> u64 {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

impl Entity for Practice {
    const COLLECTION: &'static str = "practices";
    const NAME: &'static str = "Practice";

    fn id(&self) -> Uuid {
        self.id
    }
}

impl Entity for PracticeWork {
    const COLLECTION: &'static str = "practice_works";
    const NAME: &'static str = "Practice work";

    fn id(&self) -> Uuid {
        self.id
    }
}

impl Entity for VideoWork {
    const COLLECTION: &'static str = "video_works";
    const NAME: &'static str = "Video work";

    fn id(&self) -> Uuid {
        self.id
    }
}

pub struct EntityRepository<T> {
    store: Arc<dyn MetadataStore>,
    _entity: PhantomData<fn() -> T>,
}

impl<T> Clone for EntityRepository<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            _entity: PhantomData,
        }
    }
}

impl<T: Entity> EntityRepository<T> {
    pub fn new(store: Arc<dyn MetadataStore>) -> Self {
        Self {
            store,
            _entity: PhantomData,
        }
    }

    fn decode(body: Value) -> Result<T, AppError> {
        serde_json::from_value(body).map_err(AppError::from)
    }

    pub async fn create(&self, entity: &T) -> Result<(), AppError> {
        let body = serde_json::to_value(entity)?;
        self.store.create(T::COLLECTION, entity.id(), body).await
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<T>, AppError> {
        self.store
            .find_by_id(T::COLLECTION, id)
            .await?
            .map(Self::decode)
            .transpose()
    }

    /// Like `find_by_id`, but a missing record is a `NotFound` error
    pub async fn get(&self, id: Uuid) -> Result<T, AppError> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{} not found", T::NAME)))
    }


    pub async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        self.store.delete(T::COLLECTION, id).await
    }

    pub async fn list(&self) -> Result<Vec<T>, AppError> {
        self.store
            .list(T::COLLECTION)
            .await?
            .into_iter()
            .map(Self::decode)
            .collect()
    }

    pub async fn find_by_field(&self, field: &str, value: &str) -> Result<Vec<T>, AppError> {
        self.store
            .find_by_field(T::COLLECTION, field, value)
            .await?
            .into_iter()
            .map(Self::decode)
            .collect()
    }
}

impl<T: Versioned> EntityRepository<T> {
    /// Write back an entity read earlier. Fails with `Conflict` when another write landed
    /// since that read; on success `entity` carries its new version.
    pub async fn update(&self, entity: &mut T) -> Result<(), AppError> {
        let expected = entity.version();
        entity.set_version(expected + 1);
        let result = self.write_revision(entity, expected).await;
        if result.is_err() {
            entity.set_version(expected);
        }
        result
    }

    async fn write_revision(&self, entity: &T, expected: u64) -> Result<(), AppError> {
        let body = serde_json::to_value(entity)?;
        match self
            .store
            .update(T::COLLECTION, entity.id(), expected, body)
            .await?
        {
            UpdateOutcome::Updated => Ok(()),
            UpdateOutcome::Missing => Err(AppError::NotFound(format!("{} not found", T::NAME))),
            UpdateOutcome::Stale => Err(AppError::Conflict(format!(
                "{} was modified by another request",
                T::NAME
            ))),
        }
    }
}
