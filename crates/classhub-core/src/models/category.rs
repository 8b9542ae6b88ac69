//! Logical file classes. A category decides the storage directory of an upload and which
//! content types it accepts.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Content types accepted for generic uploads (materials and student submissions).
pub const GENERIC_CONTENT_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    "image/svg+xml",
    "video/mp4",
    "video/avi",
    "video/mov",
    "video/quicktime",
    "video/wmv",
    "video/flv",
    "video/webm",
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.ms-powerpoint",
    "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    "audio/mpeg",
    "audio/wav",
    "audio/mp3",
    "audio/ogg",
    "audio/m4a",
    "application/zip",
    "application/x-rar-compressed",
    "application/x-7z-compressed",
    "text/plain",
    "application/json",
    "text/csv",
];

const PRESENTATION_CONTENT_TYPES: &[&str] = &[
    "application/pdf",
    "application/vnd.ms-powerpoint",
    "application/vnd.openxmlformats-officedocument.presentationml.presentation",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Video,
    Audio,
    Presentation,
    Material,
    Thumbnail,
    Submission,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Video,
        Category::Audio,
        Category::Presentation,
        Category::Material,
        Category::Thumbnail,
        Category::Submission,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Video => "video",
            Category::Audio => "audio",
            Category::Presentation => "presentation",
            Category::Material => "material",
            Category::Thumbnail => "thumbnail",
            Category::Submission => "submission",
        }
    }

    /// Directory (relative to the backend root) holding objects of this category.
    pub fn directory(&self) -> &'static str {
        match self {
            Category::Video => "videos",
            Category::Audio => "audios",
            Category::Presentation => "presentations",
            Category::Material => "materials",
            Category::Thumbnail => "thumbnails",
            Category::Submission => "files",
        }
    }

    /// Whitelist patterns; `type/*` matches every subtype.
    pub fn allowed_content_types(&self) -> &'static [&'static str] {
        match self {
            Category::Video => &["video/*"],
            Category::Audio => &["audio/*"],
            Category::Presentation => PRESENTATION_CONTENT_TYPES,
            Category::Thumbnail => &["image/*"],
            Category::Material | Category::Submission => GENERIC_CONTENT_TYPES,
        }
    }

    /// Whether `content_type` (already normalized: lowercase, no parameters) is accepted.
    pub fn accepts(&self, content_type: &str) -> bool {
        self.allowed_content_types()
            .iter()
            .any(|pattern| match pattern.strip_suffix("/*") {
                Some(major) => content_type
                    .split_once('/')
                    .is_some_and(|(ct_major, sub)| ct_major == major && !sub.is_empty()),
                None => *pattern == content_type,
            })
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s || c.directory() == s)
            .ok_or_else(|| format!("Unknown category: {}", s))
    }
}
