use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::asset::{Asset, OwnsAssets};

/// `fileType` stored for link materials
pub const LINK_FILE_TYPE: &str = "link";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MaterialContent {
    /// Uploaded file held by the storage backend
    File,
    /// External URL supplied by the caller
    Link,
}

impl FromStr for MaterialContent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "file" => Ok(MaterialContent::File),
            "link" => Ok(MaterialContent::Link),
            other => Err(format!("must be 'file' or 'link', got '{}'", other)),
        }
    }
}

impl fmt::Display for MaterialContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaterialContent::File => f.write_str("file"),
            MaterialContent::Link => f.write_str("link"),
        }
    }
}

/// A teaching material: an uploaded document or an external link, with an optional
/// thumbnail image.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Material {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub content: MaterialContent,
    pub file_url: String,
    pub file_type: String,
    /// Present when `content` is `file` and the bytes live in our storage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<Asset>,
    #[serde(default)]
    pub thumbnail_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<Asset>,
    /// Bumped by every successful update
    #[serde(default)]
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OwnsAssets for Material {
    fn owned_assets(&self) -> Vec<&Asset> {
        self.file.iter().chain(self.thumbnail.iter()).collect()
    }
}
