use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, State},
    http::HeaderMap,
    Json,
};
use classhub_core::models::{LessonVideo, VideoFileKind};
use classhub_core::AppError;
use uuid::Uuid;

use super::{success, success_message, SuccessResponse};
use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::intake::{intake, VIDEO_ATTACHMENT_FIELDS, VIDEO_FIELDS};
use crate::services::detached;
use crate::services::lesson_videos::{LessonVideoService, UpdateVideoInfo};
use crate::services::url_resolver::request_host;
use crate::state::AppState;

#[utoipa::path(
    post,
    path = "/api/videos",
    tag = "videos",
    request_body(content = inline(Object), content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Lesson video created", body = LessonVideo),
        (status = 400, description = "Missing or invalid field", body = ErrorResponse),
        (status = 413, description = "File too large", body = ErrorResponse),
        (status = 415, description = "Content type not accepted", body = ErrorResponse),
        (status = 503, description = "Storage backend unavailable", body = ErrorResponse)
    )
)]
pub async fn create_video(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Json<SuccessResponse<LessonVideo>>, HttpAppError> {
    let batch = intake(multipart, VIDEO_FIELDS, &state.media.limits).await?;
    let host = request_host(&headers);
    let service = LessonVideoService::new(state);
    let video = detached(async move { service.create(batch, host).await }).await?;
    Ok(success(video))
}

#[utoipa::path(
    get,
    path = "/api/videos",
    tag = "videos",
    responses((status = 200, description = "All lesson videos, newest first", body = [LessonVideo]))
)]
pub async fn list_videos(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SuccessResponse<Vec<LessonVideo>>>, HttpAppError> {
    let videos = LessonVideoService::new(state).list().await?;
    Ok(success(videos))
}

#[utoipa::path(
    get,
    path = "/api/videos/{id}",
    tag = "videos",
    params(("id" = Uuid, Path, description = "Lesson video id")),
    responses(
        (status = 200, description = "Lesson video", body = LessonVideo),
        (status = 404, description = "Video not found", body = ErrorResponse)
    )
)]
pub async fn get_video(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SuccessResponse<LessonVideo>>, HttpAppError> {
    let video = LessonVideoService::new(state).get(id).await?;
    Ok(success(video))
}

#[utoipa::path(
    put,
    path = "/api/videos/{id}",
    tag = "videos",
    params(("id" = Uuid, Path, description = "Lesson video id")),
    request_body = UpdateVideoInfo,
    responses(
        (status = 200, description = "Title and description updated", body = LessonVideo),
        (status = 404, description = "Video not found", body = ErrorResponse)
    )
)]
pub async fn update_video_info(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    ValidatedJson(info): ValidatedJson<UpdateVideoInfo>,
) -> Result<Json<SuccessResponse<LessonVideo>>, HttpAppError> {
    let video = LessonVideoService::new(state).update_info(id, info).await?;
    Ok(success(video))
}

#[utoipa::path(
    post,
    path = "/api/videos/{id}/files",
    tag = "videos",
    params(("id" = Uuid, Path, description = "Lesson video id")),
    request_body(content = inline(Object), content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Files merged into the video", body = LessonVideo),
        (status = 400, description = "Missing or invalid field", body = ErrorResponse),
        (status = 404, description = "Video not found", body = ErrorResponse),
        (status = 503, description = "Storage backend unavailable", body = ErrorResponse)
    )
)]
pub async fn add_video_files(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Json<SuccessResponse<LessonVideo>>, HttpAppError> {
    let batch = intake(multipart, VIDEO_ATTACHMENT_FIELDS, &state.media.limits).await?;
    let host = request_host(&headers);
    let service = LessonVideoService::new(state);
    let video = detached(async move { service.add_files(id, batch, host).await }).await?;
    Ok(success(video))
}

#[utoipa::path(
    delete,
    path = "/api/videos/{id}/files/{kind}/{name}",
    tag = "videos",
    params(
        ("id" = Uuid, Path, description = "Lesson video id"),
        ("kind" = String, Path, description = "`audios` or `presentations`"),
        ("name" = String, Path, description = "Original filename of the entry")
    ),
    responses(
        (status = 200, description = "Entry removed", body = LessonVideo),
        (status = 400, description = "Unknown kind", body = ErrorResponse),
        (status = 404, description = "Video or entry not found", body = ErrorResponse)
    )
)]
pub async fn delete_video_file(
    State(state): State<Arc<AppState>>,
    Path((id, kind, name)): Path<(Uuid, String, String)>,
) -> Result<Json<SuccessResponse<LessonVideo>>, HttpAppError> {
    let kind: VideoFileKind = kind
        .parse()
        .map_err(|e: String| AppError::validation("kind", e))?;
    let video = LessonVideoService::new(state)
        .remove_file(id, kind, &name)
        .await?;
    Ok(success(video))
}

#[utoipa::path(
    delete,
    path = "/api/videos/{id}",
    tag = "videos",
    params(("id" = Uuid, Path, description = "Lesson video id")),
    responses(
        (status = 200, description = "Video and all of its files deleted"),
        (status = 404, description = "Video not found", body = ErrorResponse)
    )
)]
pub async fn delete_video(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SuccessResponse<()>>, HttpAppError> {
    LessonVideoService::new(state).delete(id).await?;
    Ok(success_message("Video deleted"))
}
