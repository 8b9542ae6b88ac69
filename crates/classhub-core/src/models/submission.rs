//! Student submissions and the practice assignments they reference.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::asset::{Asset, OwnsAssets};

/// Practice assignment: a task file students download and answer with a [`PracticeWork`].
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Practice {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub file_url: String,
    pub file: Asset,
    pub created_at: DateTime<Utc>,
}

impl OwnsAssets for Practice {
    fn owned_assets(&self) -> Vec<&Asset> {
        vec![&self.file]
    }
}

/// A practice as listed to a caller. `completed` and `work` are filled in only when the
/// listing was asked for on behalf of one student.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PracticeEntry {
    #[serde(flatten)]
    pub practice: Practice,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub work: Option<PracticeWork>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PracticeWork {
    pub id: Uuid,
    pub student_id: String,
    pub practice_id: Uuid,
    pub practice_title: String,
    pub file_url: String,
    pub file: Asset,
    pub created_at: DateTime<Utc>,
}

impl OwnsAssets for PracticeWork {
    fn owned_assets(&self) -> Vec<&Asset> {
        vec![&self.file]
    }
}

/// One file of a video work, titled after the file's name without extension
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedWork {
    pub title: String,
    pub file_url: String,
    pub file: Asset,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VideoWork {
    pub id: Uuid,
    pub student_id: String,
    pub video_id: Uuid,
    pub works: Vec<SubmittedWork>,
    pub created_at: DateTime<Utc>,
}

impl OwnsAssets for VideoWork {
    fn owned_assets(&self) -> Vec<&Asset> {
        self.works.iter().map(|w| &w.file).collect()
    }
}
