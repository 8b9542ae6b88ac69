//! HTTP error response conversion
//!
//! Handlers return `Result<impl IntoResponse, HttpAppError>`. Services work with `AppError`;
//! storage and intake failures are folded into `AppError` here so every error renders
//! through the same envelope, status table and log level.

use axum::{
    extract::rejection::JsonRejection,
    extract::{FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use classhub_core::{AppError, ErrorMetadata, LogLevel};
use classhub_storage::StorageError;
use serde::{de::DeserializeOwned, Serialize};
use utoipa::ToSchema;

use crate::intake::IntakeError;

/// Failure envelope: `{ "status": "error", "message": ..., "code": ..., "field"?: ... }`
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Always `"error"`
    pub status: String,
    pub message: String,
    /// Machine-readable error code for programmatic handling
    pub code: String,
    /// Request field the error refers to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// Whether this error is recoverable (can be retried)
    pub recoverable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(rename = "errorType", skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
}

/// Wrapper type for AppError to implement IntoResponse
/// This is necessary because of Rust's orphan rules - we can't implement
/// IntoResponse (external trait) for AppError (external type from classhub-core)
#[derive(Debug)]
pub struct HttpAppError(pub AppError);

impl From<AppError> for HttpAppError {
    fn from(err: AppError) -> Self {
        HttpAppError(err)
    }
}

impl From<anyhow::Error> for HttpAppError {
    fn from(err: anyhow::Error) -> Self {
        HttpAppError(AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        })
    }
}

/// Convert JSON body deserialization failures into a 400 with our ErrorResponse format.
impl From<JsonRejection> for HttpAppError {
    fn from(rejection: JsonRejection) -> Self {
        HttpAppError(AppError::validation(
            "body",
            format!("Invalid request body: {}", rejection.body_text()),
        ))
    }
}

/// JSON body extractor that returns our ErrorResponse format (400 + JSON) on deserialization failure.
#[derive(Debug, Clone, Copy)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = HttpAppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(inner) = Json::<T>::from_request(req, state)
            .await
            .map_err(HttpAppError::from)?;
        Ok(ValidatedJson(inner))
    }
}

fn log_error(error: &AppError) {
    let error_type = error.error_type();
    match error.log_level() {
        LogLevel::Debug => {
            tracing::debug!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Warn => {
            tracing::warn!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Error => {
            tracing::error!(error = %error, error_type = error_type, "Error occurred");
        }
    }
}

/// Full envelope of a non-sensitive error, carried as a response extension until
/// [`expose_error_details`] decides whether the client sees it.
#[derive(Debug, Clone)]
struct ErrorDiagnostics(ErrorResponse);

impl IntoResponse for HttpAppError {
    fn into_response(self) -> Response {
        let app_error = &self.0;

        let status = StatusCode::from_u16(app_error.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        log_error(app_error);

        let body = ErrorResponse {
            status: "error".to_string(),
            message: app_error.client_message(),
            code: app_error.error_code().to_string(),
            field: app_error.field().map(String::from),
            recoverable: app_error.is_recoverable(),
            details: None,
            error_type: None,
        };
        let diagnostics = (!app_error.is_sensitive()).then(|| ErrorResponse {
            details: Some(app_error.detailed_message()),
            error_type: Some(app_error.error_type().to_string()),
            ..body.clone()
        });

        let mut response = (status, Json(body)).into_response();
        if let Some(full) = diagnostics {
            response.extensions_mut().insert(ErrorDiagnostics(full));
        }
        response
    }
}

/// Response mapper that re-renders error envelopes with `details` and `errorType`.
///
/// Installed by the router outside production only.
pub async fn expose_error_details(mut response: Response) -> Response {
    match response.extensions_mut().remove::<ErrorDiagnostics>() {
        Some(ErrorDiagnostics(full)) => (response.status(), Json(full)).into_response(),
        None => response,
    }
}

/// Fold a storage failure into the request error taxonomy.
///
/// Anything that means "the bytes could not be written or reached" is a 503; host, port
/// and credentials never appear in the resulting message.
pub fn storage_app_error(err: StorageError) -> AppError {
    match err {
        StorageError::NotFound(msg) => AppError::NotFound(msg),
        StorageError::InvalidKey(msg) => AppError::validation("key", msg),
        StorageError::UploadFailed(msg)
        | StorageError::DeleteFailed(msg)
        | StorageError::BackendError(msg)
        | StorageError::Timeout(msg) => AppError::BackendUnavailable(msg),
        err @ StorageError::BackendUnavailable { .. } => {
            AppError::BackendUnavailable(err.to_string())
        }
        StorageError::IoError(err) => AppError::Internal(format!("IO error: {}", err)),
        StorageError::ConfigError(msg) => AppError::Internal(msg),
    }
}

impl From<StorageError> for HttpAppError {
    fn from(err: StorageError) -> Self {
        HttpAppError(storage_app_error(err))
    }
}

impl From<IntakeError> for HttpAppError {
    fn from(err: IntakeError) -> Self {
        HttpAppError(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_not_found_maps_to_not_found() {
        let app_err = storage_app_error(StorageError::NotFound("videos/a.mp4".to_string()));
        match app_err {
            AppError::NotFound(msg) => assert_eq!(msg, "videos/a.mp4"),
            other => panic!("Expected NotFound variant, got {:?}", other),
        }
    }

    #[test]
    fn test_transfer_failures_are_backend_unavailable() {
        for err in [
            StorageError::UploadFailed("write".to_string()),
            StorageError::Timeout("put".to_string()),
            StorageError::BackendError("protocol".to_string()),
            StorageError::BackendUnavailable { attempts: 3 },
        ] {
            let app_err = storage_app_error(err);
            assert_eq!(app_err.http_status_code(), 503);
            assert_eq!(app_err.error_code(), "BACKEND_UNAVAILABLE");
        }
    }

    #[test]
    fn test_invalid_key_is_validation() {
        let app_err = storage_app_error(StorageError::InvalidKey("../x".to_string()));
        assert_eq!(app_err.http_status_code(), 400);
    }

    #[test]
    fn test_io_error_is_internal() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let app_err = storage_app_error(StorageError::IoError(io_err));
        match app_err {
            AppError::Internal(msg) => assert!(msg.contains("IO error")),
            other => panic!("Expected Internal variant, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_error_envelope_names_field() {
        let response =
            HttpAppError(AppError::validation("fileUrl", "is required for link content"))
                .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "error");
        assert_eq!(body["field"], "fileUrl");
        assert_eq!(body["code"], "VALIDATION_ERROR");
        assert!(body["message"].as_str().unwrap().contains("fileUrl"));
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_details_withheld_until_exposed() {
        let error = || HttpAppError(AppError::NotFound("Material abc".to_string()));

        let withheld = json_body(error().into_response()).await;
        assert!(withheld.get("details").is_none());
        assert!(withheld.get("errorType").is_none());

        let exposed = expose_error_details(error().into_response()).await;
        assert_eq!(exposed.status(), StatusCode::NOT_FOUND);
        let exposed = json_body(exposed).await;
        assert_eq!(exposed["code"], "NOT_FOUND");
        assert!(exposed["details"].is_string());
        assert!(exposed["errorType"].is_string());
    }

    #[tokio::test]
    async fn test_sensitive_errors_stay_redacted_when_exposed() {
        let response = HttpAppError(AppError::Internal("pool timed out".to_string())).into_response();
        let body = json_body(expose_error_details(response).await).await;
        assert!(body.get("details").is_none());
    }
}
