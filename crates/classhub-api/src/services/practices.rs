//! Practice assignments: a titled task file that students answer with practice works.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use classhub_core::models::{Practice, PracticeEntry, PracticeWork};
use classhub_core::AppError;
use uuid::Uuid;

use crate::intake::UploadBatch;
use crate::state::AppState;

pub struct PracticeService {
    state: Arc<AppState>,
}

impl PracticeService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    #[tracing::instrument(skip(self, batch, host))]
    pub async fn create(
        &self,
        mut batch: UploadBatch,
        host: Option<String>,
    ) -> Result<Practice, AppError> {
        let title = batch.required_text("title")?;
        let description = batch.text("description").unwrap_or_default().trim().to_string();
        let file = batch
            .take_one("file")
            .ok_or_else(|| AppError::validation("file", "is required"))?;

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

        let practice = Practice {
            id: Uuid::new_v4(),
            title,
            description,
            file_url: asset.public_url.clone(),
            file: asset,
            created_at: Utc::now(),
        };

        let repo = self.state.db.practices.clone();
        staged
            .persist_with(async { repo.create(&practice).await })
            .await?;

        tracing::info!(practice_id = %practice.id, "Practice created");
        Ok(practice)
    }

    /// Every practice, newest first. With a student id each entry also says whether that
    /// student already handed in a work for it.
    pub async fn list(&self, student_id: Option<&str>) -> Result<Vec<PracticeEntry>, AppError> {
        let practices = self.state.db.practices.list().await?;
        let Some(student_id) = student_id else {
            return Ok(practices.into_iter().map(unannotated).collect());
        };

        // newest work per practice
        let mut latest: HashMap<Uuid, PracticeWork> = HashMap::new();
        for work in self.works_of(student_id).await? {
            latest.entry(work.practice_id).or_insert(work);
        }

        Ok(practices
            .into_iter()
            .map(|practice| {
                let work = latest.remove(&practice.id);
                PracticeEntry {
                    practice,
                    completed: Some(work.is_some()),
                    work: None,
                }
            })
            .collect())
    }

    pub async fn get(&self, id: Uuid, student_id: Option<&str>) -> Result<PracticeEntry, AppError> {
        let practice = self.state.db.practices.get(id).await?;
        let Some(student_id) = student_id else {
            return Ok(unannotated(practice));
        };

        let work = self
            .works_of(student_id)
            .await?
            .into_iter()
            .find(|w| w.practice_id == id);
        Ok(PracticeEntry {
            practice,
            completed: Some(work.is_some()),
            work,
        })
    }

    /// Remove the record, then its task file. Works already handed in are kept.
    pub async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        let practice = self.state.db.practices.get(id).await?;
        if !self.state.db.practices.delete(id).await? {
            return Err(AppError::NotFound("Practice not found".to_string()));
        }
        self.state.media.cleanup().delete_owned(&practice).await;
        tracing::info!(practice_id = %id, "Practice deleted");
        Ok(())
    }

    async fn works_of(&self, student_id: &str) -> Result<Vec<PracticeWork>, AppError> {
        self.state
            .db
            .practice_works
            .find_by_field("studentId", student_id)
            .await
    }
}

fn unannotated(practice: Practice) -> PracticeEntry {
    PracticeEntry {
        practice,
        completed: None,
        work: None,
    }
}
