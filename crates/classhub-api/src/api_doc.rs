//! OpenAPI documentation, served at `/api/openapi.json` and rendered by RapiDoc at `/docs`.

use utoipa::OpenApi;

use crate::error;
use crate::handlers;
use crate::services::lesson_videos::UpdateVideoInfo;
use classhub_core::models;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Classhub Media API",
        version = "0.1.0",
        description = "Multipart upload, storage and cleanup of lesson media, teaching materials and student submissions. Files are stored on local disk or a remote SFTP host; every record's URLs point at the stored bytes."
    ),
    paths(
        // Materials
        handlers::materials::create_material,
        handlers::materials::list_materials,
        handlers::materials::get_material,
        handlers::materials::update_material,
        handlers::materials::delete_material,
        // Lesson videos
        handlers::videos::create_video,
        handlers::videos::list_videos,
        handlers::videos::get_video,
        handlers::videos::update_video_info,
        handlers::videos::add_video_files,
        handlers::videos::delete_video_file,
        handlers::videos::delete_video,
        // Practices
        handlers::practices::create_practice,
        handlers::practices::list_practices,
        handlers::practices::get_practice,
        handlers::practices::delete_practice,
        // Submissions
        handlers::submissions::submit_practice_work,
        handlers::submissions::delete_practice_work,
        handlers::submissions::submit_video_work,
        handlers::submissions::list_video_works,
        handlers::submissions::delete_video_work,
    ),
    components(schemas(
        error::ErrorResponse,
        models::Asset,
        models::Category,
        models::Material,
        models::MaterialContent,
        models::LessonVideo,
        models::Practice,
        models::PracticeEntry,
        models::PracticeWork,
        models::SubmittedWork,
        models::VideoWork,
        UpdateVideoInfo,
    )),
    tags(
        (name = "materials", description = "Teaching materials: uploaded files or links, with thumbnails"),
        (name = "videos", description = "Lesson videos with audio and presentation attachments"),
        (name = "practices", description = "Practice assignments and their task files"),
        (name = "submissions", description = "Student practice and video work uploads")
    )
)]
pub struct ApiDoc;
