//! Resource route groups (materials, lesson videos, practices, submissions).

use crate::handlers;
use crate::state::AppState;
use axum::routing::{delete, get, post};
use axum::Router;
use std::sync::Arc;

pub fn material_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/materials",
            post(handlers::materials::create_material).get(handlers::materials::list_materials),
        )
        .route(
            "/api/materials/{id}",
            get(handlers::materials::get_material)
                .put(handlers::materials::update_material)
                .delete(handlers::materials::delete_material),
        )
}

pub fn video_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/videos",
            post(handlers::videos::create_video).get(handlers::videos::list_videos),
        )
        .route(
            "/api/videos/{id}",
            get(handlers::videos::get_video)
                .put(handlers::videos::update_video_info)
                .delete(handlers::videos::delete_video),
        )
        .route(
            "/api/videos/{id}/files",
            post(handlers::videos::add_video_files),
        )
        .route(
            "/api/videos/{id}/files/{kind}/{name}",
            delete(handlers::videos::delete_video_file),
        )
}

pub fn practice_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/practices",
            post(handlers::practices::create_practice).get(handlers::practices::list_practices),
        )
        .route(
            "/api/practices/{id}",
            get(handlers::practices::get_practice).delete(handlers::practices::delete_practice),
        )
}

pub fn submission_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/practice-works",
            post(handlers::submissions::submit_practice_work),
        )
        .route(
            "/api/practice-works/{id}",
            delete(handlers::submissions::delete_practice_work),
        )
        .route(
            "/api/video-works",
            post(handlers::submissions::submit_video_work),
        )
        .route(
            "/api/video-works/{id}",
            get(handlers::submissions::list_video_works)
                .delete(handlers::submissions::delete_video_work),
        )
}
