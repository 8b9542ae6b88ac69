use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::asset::{Asset, OwnsAssets};

/// A lesson video with its supporting audio tracks and presentation files.
///
/// Audios and presentations are keyed by original filename; uploading a file with an
/// existing name replaces the entry.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LessonVideo {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<Asset>,
    #[serde(default)]
    pub audios: BTreeMap<String, Asset>,
    #[serde(default)]
    pub presentations: BTreeMap<String, Asset>,
    /// Bumped by every successful update
    #[serde(default)]
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LessonVideo {
    pub fn files(&self, kind: VideoFileKind) -> &BTreeMap<String, Asset> {
        match kind {
            VideoFileKind::Audios => &self.audios,
            VideoFileKind::Presentations => &self.presentations,
        }
    }

    pub fn files_mut(&mut self, kind: VideoFileKind) -> &mut BTreeMap<String, Asset> {
        match kind {
            VideoFileKind::Audios => &mut self.audios,
            VideoFileKind::Presentations => &mut self.presentations,
        }
    }
}

impl OwnsAssets for LessonVideo {
    fn owned_assets(&self) -> Vec<&Asset> {
        self.video
            .iter()
            .chain(self.audios.values())
            .chain(self.presentations.values())
            .collect()
    }
}

/// The multi-file maps of a lesson video
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum VideoFileKind {
    Audios,
    Presentations,
}

impl FromStr for VideoFileKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "audios" => Ok(VideoFileKind::Audios),
            "presentations" => Ok(VideoFileKind::Presentations),
            other => Err(format!(
                "must be 'audios' or 'presentations', got '{}'",
                other
            )),
        }
    }
}

impl fmt::Display for VideoFileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VideoFileKind::Audios => f.write_str("audios"),
            VideoFileKind::Presentations => f.write_str("presentations"),
        }
    }
}
