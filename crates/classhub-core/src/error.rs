//! Error types module
//!
//! All request-level failures are unified under `AppError`. Each variant self-describes
//! its HTTP response characteristics through `ErrorMetadata` so the HTTP layer can render
//! them without matching on variants.
//!
//! The `Database` variant and `From<sqlx::Error>` are gated behind the `sqlx` feature.

use std::io;

#[cfg(feature = "sqlx")]
use sqlx::Error as SqlxError;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues like an unreachable backend
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "VALIDATION_ERROR")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether details should be hidden from clients
    fn is_sensitive(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[source] SqlxError),

    #[cfg(not(feature = "sqlx"))]
    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid field '{field}': {message}")]
    Validation { field: String, message: String },

    #[error("Unsupported media type for '{field}': {message}")]
    UnsupportedMedia { field: String, message: String },

    #[error("Payload too large: {message}")]
    PayloadTooLarge {
        field: Option<String>,
        message: String,
    },

    #[error("Storage backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// The record changed between read and write
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

impl AppError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn unsupported_media(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::UnsupportedMedia {
            field: field.into(),
            message: message.into(),
        }
    }

    /// The request field the error refers to, when there is one.
    pub fn field(&self) -> Option<&str> {
        match self {
            AppError::Validation { field, .. } | AppError::UnsupportedMedia { field, .. } => {
                Some(field)
            }
            AppError::PayloadTooLarge { field, .. } => field.as_deref(),
            _ => None,
        }
    }

    /// Get the error type name for detailed error responses
    pub fn error_type(&self) -> &str {
        match self {
            AppError::Database(_) => "Database",
            AppError::Validation { .. } => "ValidationError",
            AppError::UnsupportedMedia { .. } => "UnsupportedMediaError",
            AppError::PayloadTooLarge { .. } => "PayloadTooLargeError",
            AppError::BackendUnavailable(_) => "BackendUnavailableError",
            AppError::NotFound(_) => "NotFoundError",
            AppError::Conflict(_) => "ConflictError",
            AppError::Internal(_) => "UnknownError",
            AppError::InternalWithSource { .. } => "UnknownError",
        }
    }

    /// Get detailed error information including error chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

#[cfg(feature = "sqlx")]
impl From<SqlxError> for AppError {
    fn from(err: SqlxError) -> Self {
        AppError::Database(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(format!("Record serialization error: {}", err))
    }
}

/// Static metadata for each variant: (http_status, error_code, recoverable, sensitive, log_level).
fn app_error_static_metadata(err: &AppError) -> (u16, &'static str, bool, bool, LogLevel) {
    match err {
        AppError::Database(_) => (500, "DATABASE_ERROR", true, true, LogLevel::Error),
        AppError::Validation { .. } => (400, "VALIDATION_ERROR", false, false, LogLevel::Debug),
        AppError::UnsupportedMedia { .. } => {
            (415, "UNSUPPORTED_MEDIA_TYPE", false, false, LogLevel::Debug)
        }
        AppError::PayloadTooLarge { .. } => {
            (413, "PAYLOAD_TOO_LARGE", false, false, LogLevel::Debug)
        }
        AppError::BackendUnavailable(_) => {
            (503, "BACKEND_UNAVAILABLE", true, true, LogLevel::Warn)
        }
        AppError::NotFound(_) => (404, "NOT_FOUND", false, false, LogLevel::Debug),
        AppError::Conflict(_) => (409, "CONFLICT", true, false, LogLevel::Warn),
        AppError::Internal(_) => (500, "INTERNAL_ERROR", true, true, LogLevel::Error),
        AppError::InternalWithSource { .. } => {
            (500, "INTERNAL_ERROR", true, true, LogLevel::Error)
        }
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        app_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).2
    }

    fn is_sensitive(&self) -> bool {
        app_error_static_metadata(self).3
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).4
    }

    fn client_message(&self) -> String {
        match self {
            AppError::Database(_) => "Failed to access metadata store".to_string(),
            AppError::Validation { field, message } => format!("{}: {}", field, message),
            AppError::UnsupportedMedia { field, message } => format!("{}: {}", field, message),
            AppError::PayloadTooLarge { message, .. } => message.clone(),
            AppError::BackendUnavailable(_) => {
                "Storage backend is temporarily unavailable".to_string()
            }
            AppError::NotFound(msg) | AppError::Conflict(msg) => msg.clone(),
            AppError::Internal(_) => "Internal server error".to_string(),
            AppError::InternalWithSource { .. } => "Internal server error".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_metadata_validation() {
        let err = AppError::validation("fileUrl", "required for link content");
        assert_eq!(err.http_status_code(), 400);
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
        assert_eq!(err.field(), Some("fileUrl"));
        assert!(err.client_message().contains("fileUrl"));
        assert!(!err.is_sensitive());
        assert_eq!(err.log_level(), LogLevel::Debug);
    }

    #[test]
    fn test_error_metadata_status_codes() {
        assert_eq!(
            AppError::unsupported_media("thumbnail", "text/plain").http_status_code(),
            415
        );
        assert_eq!(
            AppError::PayloadTooLarge {
                field: None,
                message: "too big".to_string()
            }
            .http_status_code(),
            413
        );
        assert_eq!(
            AppError::BackendUnavailable("retries exhausted".to_string()).http_status_code(),
            503
        );
        assert_eq!(AppError::NotFound("Material".to_string()).http_status_code(), 404);
        assert_eq!(AppError::Conflict("Video".to_string()).http_status_code(), 409);
        assert_eq!(AppError::Internal("boom".to_string()).http_status_code(), 500);
    }

    #[test]
    fn test_backend_unavailable_hides_cause() {
        let err = AppError::BackendUnavailable("connect to 10.0.0.5:22 refused".to_string());
        assert!(err.is_sensitive());
        assert!(err.is_recoverable());
        assert!(!err.client_message().contains("10.0.0.5"));
    }

    #[test]
    fn test_error_metadata_database() {
        #[cfg(feature = "sqlx")]
        let err = AppError::from(sqlx::Error::PoolClosed);
        #[cfg(not(feature = "sqlx"))]
        let err = AppError::Database("pool closed".to_string());
        assert_eq!(err.http_status_code(), 500);
        assert_eq!(err.error_code(), "DATABASE_ERROR");
        assert_eq!(err.client_message(), "Failed to access metadata store");
        assert_eq!(err.error_type(), "Database");
    }
}
