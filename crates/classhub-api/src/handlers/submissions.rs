use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, State},
    http::HeaderMap,
    Json,
};
use classhub_core::models::{PracticeWork, VideoWork};
use uuid::Uuid;

use super::{success, success_message, SuccessResponse};
use crate::error::{ErrorResponse, HttpAppError};
use crate::intake::{intake, PRACTICE_WORK_FIELDS, VIDEO_WORK_FIELDS};
use crate::services::detached;
use crate::services::submissions::SubmissionService;
use crate::services::url_resolver::request_host;
use crate::state::AppState;

#[utoipa::path(
    post,
    path = "/api/practice-works",
    tag = "submissions",
    request_body(content = inline(Object), content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Practice work stored", body = PracticeWork),
        (status = 400, description = "Missing or invalid field", body = ErrorResponse),
        (status = 404, description = "Practice not found", body = ErrorResponse),
        (status = 503, description = "Storage backend unavailable", body = ErrorResponse)
    )
)]
pub async fn submit_practice_work(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Json<SuccessResponse<PracticeWork>>, HttpAppError> {
    let batch = intake(multipart, PRACTICE_WORK_FIELDS, &state.media.limits).await?;
    let host = request_host(&headers);
    let service = SubmissionService::new(state);
    let work = detached(async move { service.submit_practice_work(batch, host).await }).await?;
    Ok(success(work))
}

#[utoipa::path(
    delete,
    path = "/api/practice-works/{id}",
    tag = "submissions",
    params(("id" = Uuid, Path, description = "Practice work id")),
    responses(
        (status = 200, description = "Practice work and its file deleted"),
        (status = 404, description = "Practice work not found", body = ErrorResponse)
    )
)]
pub async fn delete_practice_work(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SuccessResponse<()>>, HttpAppError> {
    SubmissionService::new(state).delete_practice_work(id).await?;
    Ok(success_message("Practice work deleted"))
}

#[utoipa::path(
    post,
    path = "/api/video-works",
    tag = "submissions",
    request_body(content = inline(Object), content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Video work stored", body = VideoWork),
        (status = 400, description = "Missing or invalid field", body = ErrorResponse),
        (status = 404, description = "Video not found", body = ErrorResponse),
        (status = 503, description = "Storage backend unavailable", body = ErrorResponse)
    )
)]
pub async fn submit_video_work(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Json<SuccessResponse<VideoWork>>, HttpAppError> {
    let batch = intake(multipart, VIDEO_WORK_FIELDS, &state.media.limits).await?;
    let host = request_host(&headers);
    let service = SubmissionService::new(state);
    let work = detached(async move { service.submit_video_work(batch, host).await }).await?;
    Ok(success(work))
}

#[utoipa::path(
    get,
    path = "/api/video-works/{id}",
    tag = "submissions",
    params(("id" = Uuid, Path, description = "Lesson video id")),
    responses((status = 200, description = "Video works submitted for the video", body = [VideoWork]))
)]
pub async fn list_video_works(
    State(state): State<Arc<AppState>>,
    Path(video_id): Path<Uuid>,
) -> Result<Json<SuccessResponse<Vec<VideoWork>>>, HttpAppError> {
    let works = SubmissionService::new(state)
        .list_video_works(video_id)
        .await?;
    Ok(success(works))
}

#[utoipa::path(
    delete,
    path = "/api/video-works/{id}",
    tag = "submissions",
    params(("id" = Uuid, Path, description = "Video work id")),
    responses(
        (status = 200, description = "Video work and its files deleted"),
        (status = 404, description = "Video work not found", body = ErrorResponse)
    )
)]
pub async fn delete_video_work(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SuccessResponse<()>>, HttpAppError> {
    SubmissionService::new(state).delete_video_work(id).await?;
    Ok(success_message("Video work deleted"))
}
