//! Public URL computation for stored objects.

use axum::http::{header, HeaderMap};
use classhub_core::{DomainRule, PublicUrlConfig};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// RFC 3986 unreserved characters stay as they are.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Maps a serving context (the request's `Host`) to the base URL clients can reach.
///
/// Rules are tried in order; the first whose fragment occurs in the host wins. The same
/// host and path always produce the same URL.
#[derive(Debug, Clone)]
pub struct UrlResolver {
    default_base: String,
    rules: Vec<DomainRule>,
}

impl UrlResolver {
    pub fn new(config: &PublicUrlConfig) -> Self {
        Self {
            default_base: config.default_base.trim_end_matches('/').to_string(),
            rules: config
                .rules
                .iter()
                .map(|r| DomainRule {
                    host_fragment: r.host_fragment.to_lowercase(),
                    base_url: r.base_url.trim_end_matches('/').to_string(),
                })
                .collect(),
        }
    }

    pub fn base_for(&self, host: Option<&str>) -> &str {
        let Some(host) = host.map(str::to_lowercase) else {
            return &self.default_base;
        };
        self.rules
            .iter()
            .find(|r| host.contains(&r.host_fragment))
            .map(|r| r.base_url.as_str())
            .unwrap_or(&self.default_base)
    }

    /// `public_path` is the backend's URL path for a key, e.g. `/media/files/a b.pdf`.
    pub fn resolve(&self, host: Option<&str>, public_path: &str) -> String {
        let encoded: Vec<String> = public_path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| utf8_percent_encode(s, PATH_SEGMENT).to_string())
            .collect();
        format!("{}/{}", self.base_for(host), encoded.join("/"))
    }
}

/// Host the request was addressed to
pub fn request_host(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> UrlResolver {
        UrlResolver::new(&PublicUrlConfig {
            default_base: "https://classhub.example/".to_string(),
            rules: vec![
                DomainRule {
                    host_fragment: "teacher.".to_string(),
                    base_url: "https://teacher.classhub.example".to_string(),
                },
                DomainRule {
                    host_fragment: "localhost".to_string(),
                    base_url: "http://localhost:4000".to_string(),
                },
            ],
        })
    }

    #[test]
    fn test_first_matching_rule_wins() {
        let r = resolver();
        assert_eq!(
            r.base_for(Some("Teacher.classhub.example")),
            "https://teacher.classhub.example"
        );
        assert_eq!(r.base_for(Some("localhost:4000")), "http://localhost:4000");
        assert_eq!(r.base_for(Some("classhub.example")), "https://classhub.example");
        assert_eq!(r.base_for(None), "https://classhub.example");
    }

    #[test]
    fn test_resolve_encodes_segments() {
        let r = resolver();
        let url = r.resolve(Some("classhub.example"), "/media/files/my notes#1.pdf");
        assert_eq!(url, "https://classhub.example/media/files/my%20notes%231.pdf");
    }

    #[test]
    fn test_resolve_is_deterministic() {
        let r = resolver();
        let a = r.resolve(Some("teacher.classhub.example"), "/media/videos/1_a.mp4");
        let b = r.resolve(Some("teacher.classhub.example"), "/media/videos/1_a.mp4");
        assert_eq!(a, b);
        assert_eq!(a, "https://teacher.classhub.example/media/videos/1_a.mp4");
    }

    #[test]
    fn test_request_host() {
        let mut headers = HeaderMap::new();
        assert_eq!(request_host(&headers), None);
        headers.insert(header::HOST, "teacher.classhub.example".parse().unwrap());
        assert_eq!(
            request_host(&headers).as_deref(),
            Some("teacher.classhub.example")
        );
    }
}
