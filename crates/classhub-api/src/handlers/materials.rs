use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, State},
    http::HeaderMap,
    Json,
};
use classhub_core::models::Material;
use uuid::Uuid;

use super::{success, success_message, SuccessResponse};
use crate::error::{ErrorResponse, HttpAppError};
use crate::intake::{intake, MATERIAL_FIELDS};
use crate::services::detached;
use crate::services::materials::MaterialService;
use crate::services::url_resolver::request_host;
use crate::state::AppState;

#[utoipa::path(
    post,
    path = "/api/materials",
    tag = "materials",
    request_body(content = inline(Object), content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Material created", body = Material),
        (status = 400, description = "Missing or invalid field", body = ErrorResponse),
        (status = 413, description = "File too large", body = ErrorResponse),
        (status = 415, description = "Content type not accepted", body = ErrorResponse),
        (status = 503, description = "Storage backend unavailable", body = ErrorResponse)
    )
)]
pub async fn create_material(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Json<SuccessResponse<Material>>, HttpAppError> {
    let batch = intake(multipart, MATERIAL_FIELDS, &state.media.limits).await?;
    let host = request_host(&headers);
    let service = MaterialService::new(state);
    let material = detached(async move { service.create(batch, host).await }).await?;
    Ok(success(material))
}

#[utoipa::path(
    get,
    path = "/api/materials",
    tag = "materials",
    responses((status = 200, description = "All materials, newest first", body = [Material]))
)]
pub async fn list_materials(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SuccessResponse<Vec<Material>>>, HttpAppError> {
    let materials = MaterialService::new(state).list().await?;
    Ok(success(materials))
}

#[utoipa::path(
    get,
    path = "/api/materials/{id}",
    tag = "materials",
    params(("id" = Uuid, Path, description = "Material id")),
    responses(
        (status = 200, description = "Material", body = Material),
        (status = 404, description = "Material not found", body = ErrorResponse)
    )
)]
pub async fn get_material(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SuccessResponse<Material>>, HttpAppError> {
    let material = MaterialService::new(state).get(id).await?;
    Ok(success(material))
}

#[utoipa::path(
    put,
    path = "/api/materials/{id}",
    tag = "materials",
    params(("id" = Uuid, Path, description = "Material id")),
    request_body(content = inline(Object), content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Material updated", body = Material),
        (status = 400, description = "Missing or invalid field", body = ErrorResponse),
        (status = 404, description = "Material not found", body = ErrorResponse),
        (status = 415, description = "Content type not accepted", body = ErrorResponse),
        (status = 503, description = "Storage backend unavailable", body = ErrorResponse)
    )
)]
pub async fn update_material(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Json<SuccessResponse<Material>>, HttpAppError> {
    let batch = intake(multipart, MATERIAL_FIELDS, &state.media.limits).await?;
    let host = request_host(&headers);
    let service = MaterialService::new(state);
    let material = detached(async move { service.update(id, batch, host).await }).await?;
    Ok(success(material))
}

#[utoipa::path(
    delete,
    path = "/api/materials/{id}",
    tag = "materials",
    params(("id" = Uuid, Path, description = "Material id")),
    responses(
        (status = 200, description = "Material and its files deleted"),
        (status = 404, description = "Material not found", body = ErrorResponse)
    )
)]
pub async fn delete_material(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SuccessResponse<()>>, HttpAppError> {
    MaterialService::new(state).delete(id).await?;
    Ok(success_message("Material deleted"))
}
