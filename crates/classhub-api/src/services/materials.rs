//! Teaching materials: an uploaded file or an external link, plus an optional thumbnail.

use std::sync::Arc;

use chrono::Utc;
use classhub_core::models::{file_type_of, Material, MaterialContent, LINK_FILE_TYPE};
use classhub_core::{AppError, Asset, Category};
use uuid::Uuid;

use super::orchestrator::MediaOrchestrator;
use crate::intake::{FilePart, UploadBatch};
use crate::state::AppState;

fn parse_content(raw: &str) -> Result<MaterialContent, AppError> {
    raw.parse()
        .map_err(|e: String| AppError::validation("content", e))
}

pub(crate) fn asset_of(assets: &[Asset], category: Category) -> Option<Asset> {
    assets.iter().find(|a| a.category == category).cloned()
}

fn non_empty(batch: &UploadBatch, name: &str) -> Option<String> {
    batch
        .text(name)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

pub struct MaterialService {
    state: Arc<AppState>,
}

impl MaterialService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    fn media(&self) -> &MediaOrchestrator {
        &self.state.media.orchestrator
    }

    pub async fn list(&self) -> Result<Vec<Material>, AppError> {
        self.state.db.materials.list().await
    }

    pub async fn get(&self, id: Uuid) -> Result<Material, AppError> {
        self.state.db.materials.get(id).await
    }

    #[tracing::instrument(skip(self, batch, host))]
    pub async fn create(
        &self,
        mut batch: UploadBatch,
        host: Option<String>,
    ) -> Result<Material, AppError> {
        let title = batch.required_text("title")?;
        let description = batch.required_text("description")?;
        let content = parse_content(&batch.required_text("content")?)?;
        let file = batch.take_one("file");
        let thumbnail = batch.take_one("thumbnail");

        let link_url = match content {
            MaterialContent::File if file.is_none() => {
                return Err(AppError::validation("file", "is required for file content"));
            }
            MaterialContent::File => None,
            MaterialContent::Link if file.is_some() => {
                return Err(AppError::validation(
                    "file",
                    "is not allowed for link content",
                ));
            }
            MaterialContent::Link => Some(
                non_empty(&batch, "fileUrl").ok_or_else(|| {
                    AppError::validation("fileUrl", "is required for link content")
                })?,
            ),
        };

        let parts: Vec<FilePart> = file.into_iter().chain(thumbnail).collect();
        let staged = self.media().stage(parts, host.as_deref()).await?;
        let file_asset = asset_of(&staged.assets, Category::Material);
        let thumbnail_asset = asset_of(&staged.assets, Category::Thumbnail);

        let file_type = match &file_asset {
            Some(asset) => file_type_of(&asset.original_filename),
            None => LINK_FILE_TYPE.to_string(),
        };
        let now = Utc::now();
        let material = Material {
            id: Uuid::new_v4(),
            title,
            description,
            content,
            file_url: file_asset
                .as_ref()
                .map(|a| a.public_url.clone())
                .or(link_url)
                .unwrap_or_default(),
            file_type,
            file: file_asset,
            thumbnail_url: thumbnail_asset
                .as_ref()
                .map(|a| a.public_url.clone())
                .unwrap_or_default(),
            thumbnail: thumbnail_asset,
            version: 0,
            created_at: now,
            updated_at: now,
        };

        let repo = self.state.db.materials.clone();
        staged
            .persist_with(async { repo.create(&material).await })
            .await?;

        tracing::info!(
            material_id = %material.id,
            content = %material.content,
            file_type = %material.file_type,
            "Material created"
        );
        Ok(material)
    }

    /// Replace any of the material's fields. Replaced files are deleted only after the
    /// record update succeeded.
    #[tracing::instrument(skip(self, batch, host), fields(material_id = %id))]
    pub async fn update(
        &self,
        id: Uuid,
        mut batch: UploadBatch,
        host: Option<String>,
    ) -> Result<Material, AppError> {
        let mut material = self.state.db.materials.get(id).await?;

        let content = match non_empty(&batch, "content") {
            Some(raw) => parse_content(&raw)?,
            None => material.content,
        };
        let file = batch.take_one("file");
        let thumbnail = batch.take_one("thumbnail");
        let provided_file_url = non_empty(&batch, "fileUrl");
        // an explicitly empty thumbnailUrl removes the thumbnail
        let provided_thumbnail_url = batch.text("thumbnailUrl").map(|v| v.trim().to_string());

        match content {
            MaterialContent::File if file.is_none() && material.content == MaterialContent::Link => {
                return Err(AppError::validation(
                    "file",
                    "is required when switching to file content",
                ));
            }
            MaterialContent::Link if file.is_some() => {
                return Err(AppError::validation(
                    "file",
                    "is not allowed for link content",
                ));
            }
            MaterialContent::Link
                if provided_file_url.is_none() && material.content == MaterialContent::File =>
            {
                return Err(AppError::validation(
                    "fileUrl",
                    "is required for link content",
                ));
            }
            _ => {}
        }

        if let Some(title) = non_empty(&batch, "title") {
            material.title = title;
        }
        if let Some(description) = non_empty(&batch, "description") {
            material.description = description;
        }

        let parts: Vec<FilePart> = file.into_iter().chain(thumbnail).collect();
        let staged = self.media().stage(parts, host.as_deref()).await?;
        let new_file = asset_of(&staged.assets, Category::Material);
        let new_thumbnail = asset_of(&staged.assets, Category::Thumbnail);
        let mut replaced: Vec<Asset> = Vec::new();

        match content {
            MaterialContent::File => {
                if let Some(asset) = new_file {
                    replaced.extend(material.file.take());
                    material.file_url = asset.public_url.clone();
                    material.file_type = file_type_of(&asset.original_filename);
                    material.file = Some(asset);
                }
            }
            MaterialContent::Link => {
                replaced.extend(material.file.take());
                if let Some(url) = provided_file_url {
                    material.file_url = url;
                }
                material.file_type = LINK_FILE_TYPE.to_string();
            }
        }
        material.content = content;

        if let Some(asset) = new_thumbnail {
            replaced.extend(material.thumbnail.take());
            material.thumbnail_url = asset.public_url.clone();
            material.thumbnail = Some(asset);
        } else if let Some(url) = provided_thumbnail_url {
            if url != material.thumbnail_url {
                replaced.extend(material.thumbnail.take());
                material.thumbnail_url = url;
            }
        }
        material.updated_at = Utc::now();

        // a concurrent update wins; this one is compensated and reported as a conflict
        let repo = self.state.db.materials.clone();
        staged
            .persist_with(async { repo.update(&mut material).await })
            .await?;

        self.state.media.cleanup().release_replaced(replaced).await;
        tracing::info!(material_id = %material.id, "Material updated");
        Ok(material)
    }

    /// Remove the record, then every stored file it referenced.
    pub async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        let material = self.state.db.materials.get(id).await?;
        if !self.state.db.materials.delete(id).await? {
            return Err(AppError::NotFound("Material not found".to_string()));
        }
        self.state.media.cleanup().delete_owned(&material).await;
        tracing::info!(material_id = %id, "Material deleted");
        Ok(())
    }
}
