//! Multipart upload intake.
//!
//! A request body is read once into a [`RawUpload`], then checked against the field rules of
//! the route by [`validate`]. Every limit (per-field file counts, total count, per-file and
//! per-request size, content-type whitelist) is enforced here, before any storage I/O, and
//! the result is a flat [`UploadBatch`] that downstream code consumes without looking at the
//! request again.

use std::collections::HashMap;

use axum::extract::multipart::{Multipart, MultipartError};
use axum::http::StatusCode;
use bytes::{Bytes, BytesMut};
use classhub_core::{AppError, Category, UploadLimits};

/// Accepted file field of a route and the category its parts are stored under
#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub name: &'static str,
    pub category: Category,
    pub max_files: usize,
}

const fn rule(name: &'static str, category: Category, max_files: usize) -> FieldRule {
    FieldRule {
        name,
        category,
        max_files,
    }
}

pub const MATERIAL_FIELDS: &[FieldRule] = &[
    rule("file", Category::Material, 1),
    rule("thumbnail", Category::Thumbnail, 1),
];

pub const VIDEO_FIELDS: &[FieldRule] = &[
    rule("video", Category::Video, 1),
    rule("audios", Category::Audio, 5),
    rule("presentations", Category::Presentation, 5),
];

pub const VIDEO_ATTACHMENT_FIELDS: &[FieldRule] = &[
    rule("audios", Category::Audio, 5),
    rule("presentations", Category::Presentation, 5),
];

pub const PRACTICE_FIELDS: &[FieldRule] = &[rule("file", Category::Submission, 1)];

pub const PRACTICE_WORK_FIELDS: &[FieldRule] = &[rule("file", Category::Submission, 1)];

pub const VIDEO_WORK_FIELDS: &[FieldRule] = &[rule("files", Category::Submission, 10)];

#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    #[error("Malformed multipart body: {0}")]
    Multipart(#[from] MultipartError),

    #[error("Unexpected file field '{0}'")]
    UnexpectedField(String),

    #[error("Too many files in '{field}' (max {max})")]
    TooManyFiles { field: String, max: usize },

    #[error("Too many files in request (max {max})")]
    TooManyFilesTotal { field: String, max: usize },

    #[error("File in '{field}' exceeds {limit} bytes")]
    FileTooLarge { field: String, limit: u64 },

    #[error("Request body exceeds {limit} bytes")]
    RequestTooLarge { field: Option<String>, limit: u64 },

    #[error("Content type '{content_type}' is not accepted for '{field}'")]
    UnsupportedType { field: String, content_type: String },
}

impl From<IntakeError> for AppError {
    fn from(err: IntakeError) -> Self {
        let message = err.to_string();
        match err {
            IntakeError::Multipart(e) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                AppError::PayloadTooLarge {
                    field: None,
                    message,
                }
            }
            IntakeError::Multipart(e) => AppError::validation("body", e.body_text()),
            IntakeError::UnexpectedField(field)
            | IntakeError::TooManyFiles { field, .. }
            | IntakeError::TooManyFilesTotal { field, .. } => AppError::validation(field, message),
            IntakeError::FileTooLarge { field, .. } => AppError::PayloadTooLarge {
                field: Some(field),
                message,
            },
            IntakeError::RequestTooLarge { field, .. } => {
                AppError::PayloadTooLarge { field, message }
            }
            IntakeError::UnsupportedType { field, .. } => {
                AppError::unsupported_media(field, message)
            }
        }
    }
}

/// File part as received, before any rule was applied
#[derive(Debug, Clone)]
pub struct RawPart {
    pub field: String,
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

#[derive(Debug, Default)]
pub struct RawUpload {
    pub files: Vec<RawPart>,
    pub text: HashMap<String, String>,
}

/// One validated file of an upload
#[derive(Debug, Clone)]
pub struct FilePart {
    pub field: String,
    pub category: Category,
    pub original_name: String,
    pub mime_type: String,
    pub bytes: Bytes,
}

impl FilePart {
    pub fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Validated upload: file parts in request order plus the text fields of the form
#[derive(Debug, Default)]
pub struct UploadBatch {
    parts: Vec<FilePart>,
    fields: HashMap<String, String>,
}

impl UploadBatch {
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Trimmed value of a text field that must be present and non-empty
    pub fn required_text(&self, name: &str) -> Result<String, AppError> {
        match self.text(name).map(str::trim) {
            Some(value) if !value.is_empty() => Ok(value.to_string()),
            _ => Err(AppError::validation(name, "is required")),
        }
    }

    pub fn parts(&self) -> &[FilePart] {
        &self.parts
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Remove and return every part of `field`, in request order
    pub fn take(&mut self, field: &str) -> Vec<FilePart> {
        let (taken, rest) = std::mem::take(&mut self.parts)
            .into_iter()
            .partition(|p| p.field == field);
        self.parts = rest;
        taken
    }

    pub fn take_one(&mut self, field: &str) -> Option<FilePart> {
        self.take(field).into_iter().next()
    }
}

/// `audios[]` and `audios` name the same field.
fn normalize_field_name(name: &str) -> String {
    name.strip_suffix("[]").unwrap_or(name).to_string()
}

/// Lowercase `type/subtype` without parameters.
pub fn normalize_content_type(raw: Option<&str>) -> String {
    let essence = raw
        .and_then(|ct| ct.split(';').next())
        .map(str::trim)
        .filter(|ct| !ct.is_empty())
        .unwrap_or("application/octet-stream");
    essence.to_ascii_lowercase()
}

/// Read the whole body. Size ceilings are checked while streaming so an oversized part is
/// rejected without buffering it completely.
pub async fn read_multipart(
    mut multipart: Multipart,
    limits: &UploadLimits,
) -> Result<RawUpload, IntakeError> {
    let mut upload = RawUpload::default();
    let mut total: u64 = 0;

    while let Some(mut field) = multipart.next_field().await? {
        let name = normalize_field_name(field.name().unwrap_or_default());
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);

        let Some(file_name) = file_name else {
            let value = field.text().await?;
            total += value.len() as u64;
            if total > limits.max_request_size_bytes {
                return Err(IntakeError::RequestTooLarge {
                    field: Some(name),
                    limit: limits.max_request_size_bytes,
                });
            }
            upload.text.insert(name, value);
            continue;
        };

        let mut buf = BytesMut::new();
        while let Some(chunk) = field.chunk().await? {
            total += chunk.len() as u64;
            if total > limits.max_request_size_bytes {
                return Err(IntakeError::RequestTooLarge {
                    field: Some(name),
                    limit: limits.max_request_size_bytes,
                });
            }
            if (buf.len() + chunk.len()) as u64 > limits.max_file_size_bytes {
                return Err(IntakeError::FileTooLarge {
                    field: name,
                    limit: limits.max_file_size_bytes,
                });
            }
            buf.extend_from_slice(&chunk);
        }

        // empty file inputs are submitted as a part with no name and no content
        if file_name.is_empty() && buf.is_empty() {
            continue;
        }

        upload.files.push(RawPart {
            field: name,
            file_name,
            content_type,
            bytes: buf.freeze(),
        });
    }

    Ok(upload)
}

/// Apply the route's field rules and the configured limits.
pub fn validate(
    raw: RawUpload,
    rules: &[FieldRule],
    limits: &UploadLimits,
) -> Result<UploadBatch, IntakeError> {
    let mut per_field: HashMap<&'static str, usize> = HashMap::new();
    let mut total_bytes: u64 = raw.text.values().map(|v| v.len() as u64).sum();
    let mut parts = Vec::with_capacity(raw.files.len());

    for part in raw.files {
        let rule = rules
            .iter()
            .find(|r| r.name == part.field)
            .ok_or_else(|| IntakeError::UnexpectedField(part.field.clone()))?;

        let count = per_field.entry(rule.name).or_insert(0);
        *count += 1;
        if *count > rule.max_files {
            return Err(IntakeError::TooManyFiles {
                field: part.field,
                max: rule.max_files,
            });
        }
        if parts.len() + 1 > limits.max_files_per_request {
            return Err(IntakeError::TooManyFilesTotal {
                field: part.field,
                max: limits.max_files_per_request,
            });
        }

        let size = part.bytes.len() as u64;
        if size > limits.max_file_size_bytes {
            return Err(IntakeError::FileTooLarge {
                field: part.field,
                limit: limits.max_file_size_bytes,
            });
        }
        total_bytes += size;
        if total_bytes > limits.max_request_size_bytes {
            return Err(IntakeError::RequestTooLarge {
                field: Some(part.field),
                limit: limits.max_request_size_bytes,
            });
        }

        let mime_type = normalize_content_type(part.content_type.as_deref());
        if !rule.category.accepts(&mime_type) {
            return Err(IntakeError::UnsupportedType {
                field: part.field,
                content_type: mime_type,
            });
        }

        parts.push(FilePart {
            field: part.field,
            category: rule.category,
            original_name: part.file_name,
            mime_type,
            bytes: part.bytes,
        });
    }

    Ok(UploadBatch {
        parts,
        fields: raw.text,
    })
}

/// Read and validate in one step.
pub async fn intake(
    multipart: Multipart,
    rules: &[FieldRule],
    limits: &UploadLimits,
) -> Result<UploadBatch, IntakeError> {
    let raw = read_multipart(multipart, limits).await?;
    let batch = validate(raw, rules, limits)?;
    tracing::debug!(
        files = batch.parts.len(),
        bytes = batch.parts.iter().map(FilePart::size_bytes).sum::<u64>(),
        "Upload accepted by intake"
    );
    Ok(batch)
}
