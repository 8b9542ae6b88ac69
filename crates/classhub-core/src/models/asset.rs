use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::category::Category;

/// A stored binary object with a durable public URL.
///
/// `stored_path` is the backend key; `public_url` is derived from it when the asset is
/// stored and never changes afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub category: Category,
    pub stored_path: String,
    pub public_url: String,
    pub original_filename: String,
    pub size_bytes: u64,
    pub mime_type: String,
    pub created_at: DateTime<Utc>,
}

/// Lifecycle of a single asset within an upload or removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetState {
    /// Transfer started, bytes not confirmed
    Pending,
    /// Bytes confirmed and referenced by a metadata record
    Stored,
    /// Removed after replacement or owner deletion
    Deleted,
    /// A pending transfer that was compensated
    Discarded,
}

impl AssetState {
    pub fn can_transition_to(&self, next: AssetState) -> bool {
        matches!(
            (self, next),
            (AssetState::Pending, AssetState::Stored)
                | (AssetState::Pending, AssetState::Discarded)
                | (AssetState::Stored, AssetState::Deleted)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AssetState::Deleted | AssetState::Discarded)
    }
}

/// Implemented by entities that embed assets. Deleting the entity deletes every asset
/// returned here.
pub trait OwnsAssets {
    fn owned_assets(&self) -> Vec<&Asset>;
}

/// Lowercase extension of a filename without the dot, or an empty string.
pub fn file_type_of(filename: &str) -> String {
    let name = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => ext.to_lowercase(),
        _ => String::new(),
    }
}

/// Filename without its extension.
pub fn file_stem_of(filename: &str) -> &str {
    let name = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    }
}
