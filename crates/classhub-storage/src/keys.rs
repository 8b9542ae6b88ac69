//! Shared key generation for storage backends.
//!
//! Key format: `<category directory>/<filename>`. The directory comes from
//! [`Category::directory`]; the filename depends on the backend's [`KeyStrategy`]:
//!
//! - `Timestamped`: `{millis}_{tag}_{original name}` (remote backend), `tag` being eight
//!   random hex digits so two requests uploading the same name in the same millisecond
//!   still land on different keys
//! - `Suffixed`: `{stem}-{millis}-{random}.{ext}` (local backend)
//!
//! Original names are sanitized first so a key never carries separators or traversal.

use std::collections::HashSet;

use chrono::Utc;
use classhub_core::Category;
use rand::Rng;

use crate::traits::{StorageError, StorageResult};

const MAX_FILENAME_LENGTH: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStrategy {
    Timestamped,
    Suffixed,
}

impl KeyStrategy {
    pub fn generate(&self, category: Category, original_name: &str) -> String {
        let millis = Utc::now().timestamp_millis();
        match self {
            KeyStrategy::Timestamped => {
                let tag: u32 = rand::rng().random();
                timestamped_key(category, original_name, millis, tag)
            }
            KeyStrategy::Suffixed => {
                let suffix: u32 = rand::rng().random_range(0..1_000_000_000);
                suffixed_key(category, original_name, millis, suffix)
            }
        }
    }
}

pub fn timestamped_key(category: Category, original_name: &str, millis: i64, tag: u32) -> String {
    format!(
        "{}/{}_{:08x}_{}",
        category.directory(),
        millis,
        tag,
        sanitize_filename(original_name)
    )
}

pub fn suffixed_key(category: Category, original_name: &str, millis: i64, suffix: u32) -> String {
    let name = sanitize_filename(original_name);
    let (stem, ext) = split_extension(&name);
    match ext {
        Some(ext) => format!("{}/{}-{}-{}.{}", category.directory(), stem, millis, suffix, ext),
        None => format!("{}/{}-{}-{}", category.directory(), stem, millis, suffix),
    }
}

/// Reduce a client-supplied filename to a single safe path component.
pub fn sanitize_filename(filename: &str) -> String {
    let filename_only = filename.rsplit(['/', '\\']).next().unwrap_or(filename);

    let sanitized: String = filename_only
        .chars()
        .take(MAX_FILENAME_LENGTH)
        .map(|c| {
            if c.is_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    let sanitized = collapse_dots(&sanitized);
    let trimmed = sanitized.trim_start_matches('.');
    if trimmed.is_empty() {
        "file".to_string()
    } else {
        trimmed.to_string()
    }
}

fn collapse_dots(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut prev_dot = false;
    for c in name.chars() {
        if c == '.' && prev_dot {
            continue;
        }
        prev_dot = c == '.';
        out.push(c);
    }
    out
}

fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    }
}

/// Reject keys that could escape a backend root.
pub fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key.split('/').any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(StorageError::InvalidKey(
            "Storage key contains invalid characters".to_string(),
        ));
    }
    Ok(())
}

/// Hands out keys for one upload batch without repeating any of them.
///
/// Two parts with the same name uploaded in the same millisecond would otherwise get the
/// same timestamped key.
#[derive(Debug, Default)]
pub struct KeyAllocator {
    issued: HashSet<String>,
}

impl KeyAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self, candidate: String) -> String {
        if self.issued.insert(candidate.clone()) {
            return candidate;
        }

        let (dir, name) = candidate
            .rsplit_once('/')
            .map(|(d, n)| (format!("{}/", d), n.to_string()))
            .unwrap_or_else(|| (String::new(), candidate.clone()));
        let (stem, ext) = split_extension(&name);

        let mut n = 1u32;
        loop {
            let next = match ext {
                Some(ext) => format!("{}{}-{}.{}", dir, stem, n, ext),
                None => format!("{}{}-{}", dir, stem, n),
            };
            if self.issued.insert(next.clone()) {
                return next;
            }
            n += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamped_key_layout() {
        assert_eq!(
            timestamped_key(Category::Material, "Intro.pdf", 1700000000000, 0xbeef),
            "materials/1700000000000_0000beef_Intro.pdf"
        );
        assert_eq!(
            timestamped_key(Category::Thumbnail, "my cover.png", 5, u32::MAX),
            "thumbnails/5_ffffffff_my_cover.png"
        );
    }

    #[test]
    fn test_same_name_keys_differ_across_calls() {
        for strategy in [KeyStrategy::Timestamped, KeyStrategy::Suffixed] {
            let keys: HashSet<String> = (0..64)
                .map(|_| strategy.generate(Category::Submission, "homework.pdf"))
                .collect();
            assert_eq!(keys.len(), 64, "{:?}", strategy);
        }
    }

    #[test]
    fn test_suffixed_key_layout() {
        assert_eq!(
            suffixed_key(Category::Audio, "track.mp3", 42, 7),
            "audios/track-42-7.mp3"
        );
        assert_eq!(suffixed_key(Category::Submission, "README", 42, 7), "files/README-42-7");
    }

    #[test]
    fn test_sanitize_filename_strips_traversal() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("..\\..\\boot.ini"), "boot.ini");
        assert_eq!(sanitize_filename(".."), "file");
        assert_eq!(sanitize_filename("a..b.txt"), "a.b.txt");
        assert_eq!(sanitize_filename(".hidden"), "hidden");
        assert_eq!(sanitize_filename(""), "file");
    }

    #[test]
    fn test_generated_keys_are_valid() {
        for category in Category::ALL {
            for strategy in [KeyStrategy::Timestamped, KeyStrategy::Suffixed] {
                let key = strategy.generate(category, "../weird name?.PDF");
                assert!(validate_key(&key).is_ok(), "{}", key);
                assert!(key.starts_with(category.directory()));
            }
        }
    }

    #[test]
    fn test_validate_key_rejects_escapes() {
        assert!(validate_key("/etc/passwd").is_err());
        assert!(validate_key("videos/../../x").is_err());
        assert!(validate_key("videos//x").is_err());
        assert!(validate_key("").is_err());
        assert!(validate_key("videos/1_a.mp4").is_ok());
    }

    #[test]
    fn test_key_allocator_deduplicates() {
        let mut keys = KeyAllocator::new();
        assert_eq!(keys.allocate("files/1_a.pdf".to_string()), "files/1_a.pdf");
        assert_eq!(keys.allocate("files/1_a.pdf".to_string()), "files/1_a-1.pdf");
        assert_eq!(keys.allocate("files/1_a.pdf".to_string()), "files/1_a-2.pdf");
        assert_eq!(keys.allocate("files/1_b".to_string()), "files/1_b");
        assert_eq!(keys.allocate("files/1_b".to_string()), "files/1_b-1");
    }
}
