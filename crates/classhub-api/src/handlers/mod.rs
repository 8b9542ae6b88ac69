pub mod materials;
pub mod practices;
pub mod submissions;
pub mod videos;

use axum::Json;
use serde::Serialize;

/// Success envelope: `{ "status": "success", "data": ... }`, or a `message` for deletes
#[derive(Debug, Serialize)]
pub struct SuccessResponse<T> {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

pub fn success<T: Serialize>(data: T) -> Json<SuccessResponse<T>> {
    Json(SuccessResponse {
        status: "success".to_string(),
        data: Some(data),
        message: None,
    })
}

pub fn success_message(message: impl Into<String>) -> Json<SuccessResponse<()>> {
    Json(SuccessResponse {
        status: "success".to_string(),
        data: None,
        message: Some(message.into()),
    })
}
