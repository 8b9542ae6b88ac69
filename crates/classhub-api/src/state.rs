//! Application state and sub-state types.
//!
//! AppState is split into a metadata half and a media half so services only reach for the
//! collaborators they use.

use std::sync::Arc;

use classhub_core::models::{LessonVideo, Material, Practice, PracticeWork, VideoWork};
use classhub_core::{Config, UploadLimits};
use classhub_db::{EntityRepository, MetadataStore};
use classhub_storage::Storage;

use crate::services::cleanup::CleanupCoordinator;
use crate::services::orchestrator::MediaOrchestrator;
use crate::services::url_resolver::UrlResolver;

/// Metadata store and the typed repositories over it.
#[derive(Clone)]
pub struct DbState {
    pub store: Arc<dyn MetadataStore>,
    pub materials: EntityRepository<Material>,
    pub videos: EntityRepository<LessonVideo>,
    pub practices: EntityRepository<Practice>,
    pub practice_works: EntityRepository<PracticeWork>,
    pub video_works: EntityRepository<VideoWork>,
}

impl DbState {
    pub fn new(store: Arc<dyn MetadataStore>) -> Self {
        Self {
            materials: EntityRepository::new(store.clone()),
            videos: EntityRepository::new(store.clone()),
            practices: EntityRepository::new(store.clone()),
            practice_works: EntityRepository::new(store.clone()),
            video_works: EntityRepository::new(store.clone()),
            store,
        }
    }
}

/// Storage backend and everything that moves bytes in or out of it.
#[derive(Clone)]
pub struct MediaState {
    pub storage: Arc<dyn Storage>,
    pub orchestrator: MediaOrchestrator,
    pub limits: UploadLimits,
}

impl MediaState {
    pub fn new(storage: Arc<dyn Storage>, config: &Config) -> Self {
        let cleanup = CleanupCoordinator::new(storage.clone());
        let orchestrator = MediaOrchestrator::new(
            storage.clone(),
            UrlResolver::new(&config.public_url),
            cleanup,
            config.limits.transfer_concurrency,
        );
        Self {
            storage,
            orchestrator,
            limits: config.limits,
        }
    }

    pub fn cleanup(&self) -> &CleanupCoordinator {
        self.orchestrator.cleanup()
    }
}

pub struct AppState {
    pub config: Config,
    pub db: DbState,
    pub media: MediaState,
}

impl AppState {
    pub fn new(config: Config, storage: Arc<dyn Storage>, store: Arc<dyn MetadataStore>) -> Self {
        let media = MediaState::new(storage, &config);
        Self {
            db: DbState::new(store),
            media,
            config,
        }
    }
}
