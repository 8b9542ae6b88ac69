//! Student submissions for practices and lesson videos.

use std::sync::Arc;

use chrono::Utc;
use classhub_core::models::{file_stem_of, PracticeWork, SubmittedWork, VideoWork};
use classhub_core::AppError;
use uuid::Uuid;

use crate::intake::UploadBatch;
use crate::state::AppState;

fn required_id(batch: &UploadBatch, field: &str) -> Result<Uuid, AppError> {
    let raw = batch.required_text(field)?;
    Uuid::parse_str(&raw).map_err(|_| AppError::validation(field, "must be a valid id"))
}

pub struct SubmissionService {
    state: Arc<AppState>,
}

impl SubmissionService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    #[tracing::instrument(skip(self, batch, host))]
    pub async fn submit_practice_work(
        &self,
        mut batch: UploadBatch,
        host: Option<String>,
    ) -> Result<PracticeWork, AppError> {
        let practice_id = required_id(&batch, "practiceId")?;
        let student_id = batch.required_text("studentId")?;
        let file = batch
            .take_one("file")
            .ok_or_else(|| AppError::validation("file", "is required"))?;

        let practice = self.state.db.practices.get(practice_id).await?;

        let mut staged = self
            .state
            .media
            .orchestrator
            .stage(vec![file], host.as_deref())
            .await?;
        let asset = staged
            .assets
            .pop()
            .ok_or_else(|| AppError::Internal("staged batch is empty".to_string()))?;

        let work = PracticeWork {
            id: Uuid::new_v4(),
            student_id,
            practice_id,
            practice_title: practice.title,
            file_url: asset.public_url.clone(),
            file: asset,
            created_at: Utc::now(),
        };

        let repo = self.state.db.practice_works.clone();
        staged.persist_with(async { repo.create(&work).await }).await?;

        tracing::info!(work_id = %work.id, practice_id = %practice_id, "Practice work submitted");
        Ok(work)
    }

    #[tracing::instrument(skip(self, batch, host))]
    pub async fn submit_video_work(
        &self,
        mut batch: UploadBatch,
        host: Option<String>,
    ) -> Result<VideoWork, AppError> {
        let video_id = required_id(&batch, "videoId")?;
        let student_id = batch.required_text("studentId")?;
        let files = batch.take("files");
        if files.is_empty() {
            return Err(AppError::validation("files", "no files uploaded"));
        }

        self.state.db.videos.get(video_id).await?;

        let staged = self
            .state
            .media
            .orchestrator
            .stage(files, host.as_deref())
            .await?;

        let works = staged
            .assets
            .iter()
            .map(|asset| SubmittedWork {
                title: file_stem_of(&asset.original_filename).to_string(),
                file_url: asset.public_url.clone(),
                file: asset.clone(),
            })
            .collect();
        let record = VideoWork {
            id: Uuid::new_v4(),
            student_id,
            video_id,
            works,
            created_at: Utc::now(),
        };

        let repo = self.state.db.video_works.clone();
        staged
            .persist_with(async { repo.create(&record).await })
            .await?;

        tracing::info!(
            work_id = %record.id,
            video_id = %video_id,
            files = record.works.len(),
            "Video work submitted"
        );
        Ok(record)
    }

    pub async fn delete_practice_work(&self, id: Uuid) -> Result<(), AppError> {
        let work = self.state.db.practice_works.get(id).await?;
        if !self.state.db.practice_works.delete(id).await? {
            return Err(AppError::NotFound("Practice work not found".to_string()));
        }
        self.state.media.cleanup().delete_owned(&work).await;
        Ok(())
    }

    pub async fn delete_video_work(&self, id: Uuid) -> Result<(), AppError> {
        let work = self.state.db.video_works.get(id).await?;
        if !self.state.db.video_works.delete(id).await? {
            return Err(AppError::NotFound("Video work not found".to_string()));
        }
        self.state.media.cleanup().delete_owned(&work).await;
        tracing::info!(work_id = %id, files = work.works.len(), "Video work deleted");
        Ok(())
    }

    pub async fn list_video_works(&self, video_id: Uuid) -> Result<Vec<VideoWork>, AppError> {
        self.state
            .db
            .video_works
            .find_by_field("videoId", &video_id.to_string())
            .await
    }
}
