use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, Query, State},
    http::HeaderMap,
    Json,
};
use classhub_core::models::{Practice, PracticeEntry};
use serde::Deserialize;
use uuid::Uuid;

use super::{success, success_message, SuccessResponse};
use crate::error::{ErrorResponse, HttpAppError};
use crate::intake::{intake, PRACTICE_FIELDS};
use crate::services::detached;
use crate::services::practices::PracticeService;
use crate::services::url_resolver::request_host;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeQuery {
    pub student_id: Option<String>,
}

impl PracticeQuery {
    fn student(&self) -> Option<&str> {
        self.student_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

#[utoipa::path(
    post,
    path = "/api/practices",
    tag = "practices",
    request_body(content = inline(Object), content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Practice created", body = Practice),
        (status = 400, description = "Missing or invalid field", body = ErrorResponse),
        (status = 413, description = "File too large", body = ErrorResponse),
        (status = 503, description = "Storage backend unavailable", body = ErrorResponse)
    )
)]
pub async fn create_practice(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Json<SuccessResponse<Practice>>, HttpAppError> {
    let batch = intake(multipart, PRACTICE_FIELDS, &state.media.limits).await?;
    let host = request_host(&headers);
    let service = PracticeService::new(state);
    let practice = detached(async move { service.create(batch, host).await }).await?;
    Ok(success(practice))
}

#[utoipa::path(
    get,
    path = "/api/practices",
    tag = "practices",
    params(
        ("studentId" = Option<String>, Query, description = "Mark each practice as completed or not for this student")
    ),
    responses((status = 200, description = "All practices, newest first", body = [PracticeEntry]))
)]
pub async fn list_practices(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PracticeQuery>,
) -> Result<Json<SuccessResponse<Vec<PracticeEntry>>>, HttpAppError> {
    let practices = PracticeService::new(state).list(query.student()).await?;
    Ok(success(practices))
}

#[utoipa::path(
    get,
    path = "/api/practices/{id}",
    tag = "practices",
    params(
        ("id" = Uuid, Path, description = "Practice id"),
        ("studentId" = Option<String>, Query, description = "Include this student's work for the practice")
    ),
    responses(
        (status = 200, description = "Practice, with the student's work when asked for", body = PracticeEntry),
        (status = 404, description = "Practice not found", body = ErrorResponse)
    )
)]
pub async fn get_practice(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<PracticeQuery>,
) -> Result<Json<SuccessResponse<PracticeEntry>>, HttpAppError> {
    let practice = PracticeService::new(state).get(id, query.student()).await?;
    Ok(success(practice))
}

#[utoipa::path(
    delete,
    path = "/api/practices/{id}",
    tag = "practices",
    params(("id" = Uuid, Path, description = "Practice id")),
    responses(
        (status = 200, description = "Practice and its task file deleted"),
        (status = 404, description = "Practice not found", body = ErrorResponse)
    )
)]
pub async fn delete_practice(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SuccessResponse<()>>, HttpAppError> {
    PracticeService::new(state).delete(id).await?;
    Ok(success_message("Practice deleted"))
}
