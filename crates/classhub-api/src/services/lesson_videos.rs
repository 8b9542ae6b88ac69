//! Lesson videos: one main video plus audio and presentation attachments keyed by their
//! original filename.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use classhub_core::models::{LessonVideo, VideoFileKind};
use classhub_core::{AppError, Asset, Category};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use super::materials::asset_of;
use crate::intake::UploadBatch;
use crate::state::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateVideoInfo {
    pub title: Option<String>,
    pub description: Option<String>,
}

/// Insert assets by original filename. Returns the entries they displaced.
fn merge_files(
    files: &mut BTreeMap<String, Asset>,
    assets: impl IntoIterator<Item = Asset>,
) -> Vec<Asset> {
    assets
        .into_iter()
        .filter_map(|asset| files.insert(asset.original_filename.clone(), asset))
        .collect()
}

fn kind_category(kind: VideoFileKind) -> Category {
    match kind {
        VideoFileKind::Audios => Category::Audio,
        VideoFileKind::Presentations => Category::Presentation,
    }
}

fn assets_in(assets: &[Asset], category: Category) -> Vec<Asset> {
    assets
        .iter()
        .filter(|a| a.category == category)
        .cloned()
        .collect()
}

fn apply_text(target: &mut String, value: Option<&str>) {
    if let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) {
        *target = value.to_string();
    }
}

/// Attempts at a read-modify-write before a concurrent writer wins with a conflict
const MAX_WRITE_ATTEMPTS: u32 = 3;

pub struct LessonVideoService {
    state: Arc<AppState>,
}

impl LessonVideoService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    pub async fn list(&self) -> Result<Vec<LessonVideo>, AppError> {
        self.state.db.videos.list().await
    }

    pub async fn get(&self, id: Uuid) -> Result<LessonVideo, AppError> {
        self.state.db.videos.get(id).await
    }

    /// Apply `change` to the latest stored revision and write it back, re-reading and
    /// re-applying when another request updated the video in between.
    async fn modify<R>(
        &self,
        id: Uuid,
        mut change: impl FnMut(&mut LessonVideo) -> Result<R, AppError>,
    ) -> Result<(LessonVideo, R), AppError> {
        let mut attempt = 1;
        loop {
            let mut video = self.state.db.videos.get(id).await?;
            let outcome = change(&mut video)?;
            video.updated_at = Utc::now();
            match self.state.db.videos.update(&mut video).await {
                Ok(()) => return Ok((video, outcome)),
                Err(AppError::Conflict(_)) if attempt < MAX_WRITE_ATTEMPTS => {
                    tracing::debug!(video_id = %id, attempt, "Video changed underneath, retrying");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    #[tracing::instrument(skip(self, batch, host))]
    pub async fn create(
        &self,
        batch: UploadBatch,
        host: Option<String>,
    ) -> Result<LessonVideo, AppError> {
        let title = batch.required_text("title")?;
        let description = batch.text("description").unwrap_or_default().trim().to_string();
        if batch.is_empty() {
            return Err(AppError::validation("video", "no files uploaded"));
        }

        let parts = batch.parts().to_vec();
        let staged = self
            .state
            .media
            .orchestrator
            .stage(parts, host.as_deref())
            .await?;

        let now = Utc::now();
        let mut video = LessonVideo {
            id: Uuid::new_v4(),
            title,
            description,
            video: asset_of(&staged.assets, Category::Video),
            audios: BTreeMap::new(),
            presentations: BTreeMap::new(),
            version: 0,
            created_at: now,
            updated_at: now,
        };
        let mut shadowed = merge_files(
            &mut video.audios,
            assets_in(&staged.assets, Category::Audio),
        );
        shadowed.extend(merge_files(
            &mut video.presentations,
            assets_in(&staged.assets, Category::Presentation),
        ));

        let repo = self.state.db.videos.clone();
        staged.persist_with(async { repo.create(&video).await }).await?;

        // same-named parts of one request: only the last one is kept
        self.state.media.cleanup().release_replaced(shadowed).await;
        tracing::info!(
            video_id = %video.id,
            audios = video.audios.len(),
            presentations = video.presentations.len(),
            "Lesson video created"
        );
        Ok(video)
    }

    pub async fn update_info(&self, id: Uuid, info: UpdateVideoInfo) -> Result<LessonVideo, AppError> {
        let (video, ()) = self
            .modify(id, |video| {
                apply_text(&mut video.title, info.title.as_deref());
                apply_text(&mut video.description, info.description.as_deref());
                Ok(())
            })
            .await?;
        Ok(video)
    }

    /// Merge new audios and presentations into an existing video. An entry with the same
    /// original filename is replaced and its old bytes deleted after the update.
    #[tracing::instrument(skip(self, batch, host), fields(video_id = %id))]
    pub async fn add_files(
        &self,
        id: Uuid,
        batch: UploadBatch,
        host: Option<String>,
    ) -> Result<LessonVideo, AppError> {
        self.state.db.videos.get(id).await?;
        if batch.is_empty() {
            return Err(AppError::validation("audios", "no files uploaded"));
        }

        let staged = self
            .state
            .media
            .orchestrator
            .stage(batch.parts().to_vec(), host.as_deref())
            .await?;
        let assets = staged.assets.clone();

        let (video, replaced) = staged
            .persist_with(self.modify(id, |video| {
                apply_text(&mut video.title, batch.text("title"));
                apply_text(&mut video.description, batch.text("description"));
                let mut replaced = Vec::new();
                for kind in [VideoFileKind::Audios, VideoFileKind::Presentations] {
                    replaced.extend(merge_files(
                        video.files_mut(kind),
                        assets_in(&assets, kind_category(kind)),
                    ));
                }
                Ok(replaced)
            }))
            .await?;

        self.state.media.cleanup().release_replaced(replaced).await;
        Ok(video)
    }

    /// Remove one attachment entry; its bytes go after the record no longer references them.
    pub async fn remove_file(
        &self,
        id: Uuid,
        kind: VideoFileKind,
        name: &str,
    ) -> Result<LessonVideo, AppError> {
        let (video, removed) = self
            .modify(id, |video| {
                video.files_mut(kind).remove(name).ok_or_else(|| {
                    AppError::NotFound(format!("No {} entry named '{}'", kind, name))
                })
            })
            .await?;

        self.state.media.cleanup().release_replaced(vec![removed]).await;
        tracing::info!(video_id = %id, kind = %kind, "Video file removed");
        Ok(video)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        let video = self.state.db.videos.get(id).await?;
        if !self.state.db.videos.delete(id).await? {
            return Err(AppError::NotFound("Video not found".to_string()));
        }
        self.state.media.cleanup().delete_owned(&video).await;
        tracing::info!(video_id = %id, "Lesson video deleted");
        Ok(())
    }
}
