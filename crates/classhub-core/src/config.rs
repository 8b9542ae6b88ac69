//! Configuration module
//!
//! Process-wide settings read once at startup from the environment (optionally seeded from a
//! `.env` file). The resulting `Config` is immutable and handed to every component that needs
//! it; nothing reads the environment after startup.

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::storage_types::StorageBackend;

const DEFAULT_PORT: u16 = 4000;
const REQUEST_TIMEOUT_SECS: u64 = 600;
const HTTP_CONCURRENCY_LIMIT: usize = 256;
const MAX_CONNECTIONS: u32 = 20;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const REMOTE_PORT: u16 = 22;
const REMOTE_FILE_MODE: i32 = 0o644;
const CONNECT_ATTEMPTS: u32 = 3;
const CONNECT_BACKOFF_MS: u64 = 2000;
const CONNECT_TIMEOUT_SECS: u64 = 30;
const OPERATION_TIMEOUT_SECS: u64 = 300;
const MAX_FILES_PER_REQUEST: usize = 10;
const MAX_FILE_SIZE_MB: u64 = 1024;
const MAX_REQUEST_SIZE_MB: u64 = 1024;
const TRANSFER_CONCURRENCY: usize = 4;

/// HTTP server settings
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub port: u16,
    pub environment: String,
    pub cors_origins: Vec<String>,
    pub request_timeout: Duration,
    pub concurrency_limit: usize,
    pub log_json: bool,
}

/// Local-disk backend settings
#[derive(Clone, Debug)]
pub struct LocalStorageConfig {
    pub root: PathBuf,
    /// URL path prefix under which the root directory is served, e.g. `/media`
    pub public_prefix: String,
}

/// Credentials for the remote host. `Debug` never prints secrets.
#[derive(Clone)]
pub enum RemoteAuth {
    Password(String),
    PrivateKey {
        path: PathBuf,
        passphrase: Option<String>,
    },
}

impl fmt::Debug for RemoteAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteAuth::Password(_) => f.write_str("Password(<redacted>)"),
            RemoteAuth::PrivateKey { path, passphrase } => f
                .debug_struct("PrivateKey")
                .field("path", path)
                .field("passphrase", &passphrase.as_ref().map(|_| "<redacted>"))
                .finish(),
        }
    }
}

/// Bounded retry applied to remote connection setup
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetrySettings {
    pub attempts: u32,
    pub backoff: Duration,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            attempts: CONNECT_ATTEMPTS,
            backoff: Duration::from_millis(CONNECT_BACKOFF_MS),
        }
    }
}

/// Remote file-transfer host settings
#[derive(Clone, Debug)]
pub struct RemoteStorageConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub auth: RemoteAuth,
    /// Absolute directory on the host that holds every category directory
    pub media_root: String,
    pub public_prefix: String,
    pub file_mode: i32,
    pub connect_timeout: Duration,
    pub retry: RetrySettings,
}

#[derive(Clone, Debug)]
pub struct StorageBackendConfig {
    pub backend: StorageBackend,
    pub local: LocalStorageConfig,
    pub remote: Option<RemoteStorageConfig>,
    pub operation_timeout: Duration,
}

/// Maps a fragment of the inbound `Host` header to a public base URL
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DomainRule {
    pub host_fragment: String,
    pub base_url: String,
}

#[derive(Clone, Debug)]
pub struct PublicUrlConfig {
    pub default_base: String,
    /// Checked in order; the first matching rule wins
    pub rules: Vec<DomainRule>,
}

#[derive(Clone, Copy, Debug)]
pub struct UploadLimits {
    pub max_files_per_request: usize,
    pub max_file_size_bytes: u64,
    pub max_request_size_bytes: u64,
    pub transfer_concurrency: usize,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_files_per_request: MAX_FILES_PER_REQUEST,
            max_file_size_bytes: MAX_FILE_SIZE_MB * 1024 * 1024,
            max_request_size_bytes: MAX_REQUEST_SIZE_MB * 1024 * 1024,
            transfer_concurrency: TRANSFER_CONCURRENCY,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MetadataBackend {
    Postgres,
    Memory,
}

#[derive(Clone)]
pub struct MetadataConfig {
    pub backend: MetadataBackend,
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub timeout_seconds: u64,
}

impl fmt::Debug for MetadataConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetadataConfig")
            .field("backend", &self.backend)
            .field("database_url", &self.database_url.as_ref().map(|_| "<redacted>"))
            .field("max_connections", &self.max_connections)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

/// Application configuration
#[derive(Clone, Debug)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageBackendConfig,
    pub public_url: PublicUrlConfig,
    pub limits: UploadLimits,
    pub metadata: MetadataConfig,
}

impl Config {
    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        is_production_env(&self.server.environment)
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let environment = lookup("ENVIRONMENT")
            .or_else(|| lookup("APP_ENV"))
            .unwrap_or_else(|| "development".to_string());

        let cors_origins_str = var("CORS_ORIGINS", "*");
        if is_production_env(&environment) && cors_origins_str.trim() == "*" {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }
        let cors_origins: Vec<String> = cors_origins_str
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let port: u16 = var("PORT", &DEFAULT_PORT.to_string())
            .parse()
            .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?;

        let server = ServerConfig {
            port,
            environment,
            cors_origins,
            request_timeout: Duration::from_secs(
                var("REQUEST_TIMEOUT_SECS", "")
                    .parse()
                    .unwrap_or(REQUEST_TIMEOUT_SECS),
            ),
            concurrency_limit: var("HTTP_CONCURRENCY_LIMIT", "")
                .parse()
                .unwrap_or(HTTP_CONCURRENCY_LIMIT),
            log_json: var("LOG_FORMAT", "text").eq_ignore_ascii_case("json"),
        };

        let backend: StorageBackend = var("STORAGE_BACKEND", "local").parse()?;

        let local = LocalStorageConfig {
            root: PathBuf::from(var("LOCAL_STORAGE_PATH", "./media")),
            public_prefix: normalize_prefix(&var("LOCAL_PUBLIC_PREFIX", "/media")),
        };

        let retry = RetrySettings {
            attempts: var("STORAGE_CONNECT_ATTEMPTS", "")
                .parse()
                .unwrap_or(CONNECT_ATTEMPTS),
            backoff: Duration::from_millis(
                var("STORAGE_CONNECT_BACKOFF_MS", "")
                    .parse()
                    .unwrap_or(CONNECT_BACKOFF_MS),
            ),
        };

        let remote = match backend {
            StorageBackend::Local => None,
            StorageBackend::Remote => {
                let host = lookup("REMOTE_HOST").ok_or_else(|| {
                    anyhow::anyhow!("REMOTE_HOST must be set when using the remote storage backend")
                })?;
                let username = lookup("REMOTE_USERNAME").ok_or_else(|| {
                    anyhow::anyhow!(
                        "REMOTE_USERNAME must be set when using the remote storage backend"
                    )
                })?;
                let auth = match (lookup("REMOTE_PASSWORD"), lookup("REMOTE_PRIVATE_KEY_PATH")) {
                    (_, Some(path)) => RemoteAuth::PrivateKey {
                        path: PathBuf::from(path),
                        passphrase: lookup("REMOTE_PRIVATE_KEY_PASSPHRASE"),
                    },
                    (Some(password), None) => RemoteAuth::Password(password),
                    (None, None) => {
                        return Err(anyhow::anyhow!(
                            "REMOTE_PASSWORD or REMOTE_PRIVATE_KEY_PATH must be set when using the remote storage backend"
                        ))
                    }
                };
                let file_mode = parse_file_mode(&var("REMOTE_FILE_MODE", ""))
                    .unwrap_or(REMOTE_FILE_MODE);

                Some(RemoteStorageConfig {
                    host,
                    port: var("REMOTE_PORT", "").parse().unwrap_or(REMOTE_PORT),
                    username,
                    auth,
                    media_root: var("REMOTE_MEDIA_ROOT", "/media")
                        .trim_end_matches('/')
                        .to_string(),
                    public_prefix: normalize_prefix(&var("REMOTE_PUBLIC_PREFIX", "/media")),
                    file_mode,
                    connect_timeout: Duration::from_secs(
                        var("STORAGE_CONNECT_TIMEOUT_SECS", "")
                            .parse()
                            .unwrap_or(CONNECT_TIMEOUT_SECS),
                    ),
                    retry,
                })
            }
        };

        let storage = StorageBackendConfig {
            backend,
            local,
            remote,
            operation_timeout: Duration::from_secs(
                var("STORAGE_OPERATION_TIMEOUT_SECS", "")
                    .parse()
                    .unwrap_or(OPERATION_TIMEOUT_SECS),
            ),
        };

        let public_url = PublicUrlConfig {
            default_base: var("PUBLIC_BASE_URL", &format!("http://localhost:{}", port))
                .trim_end_matches('/')
                .to_string(),
            rules: parse_domain_rules(&var("PUBLIC_DOMAIN_RULES", ""))?,
        };

        let limits = UploadLimits {
            max_files_per_request: var("MAX_FILES_PER_REQUEST", "")
                .parse()
                .unwrap_or(MAX_FILES_PER_REQUEST),
            max_file_size_bytes: var("MAX_FILE_SIZE_MB", "")
                .parse()
                .unwrap_or(MAX_FILE_SIZE_MB)
                * 1024
                * 1024,
            max_request_size_bytes: var("MAX_REQUEST_SIZE_MB", "")
                .parse()
                .unwrap_or(MAX_REQUEST_SIZE_MB)
                * 1024
                * 1024,
            transfer_concurrency: var("TRANSFER_CONCURRENCY", "")
                .parse()
                .unwrap_or(TRANSFER_CONCURRENCY),
        };

        let metadata_backend = match var("METADATA_BACKEND", "postgres")
            .to_lowercase()
            .as_str()
        {
            "postgres" | "postgresql" => MetadataBackend::Postgres,
            "memory" | "in-memory" => MetadataBackend::Memory,
            other => {
                return Err(anyhow::anyhow!(
                    "Invalid METADATA_BACKEND '{}'. Expected 'postgres' or 'memory'",
                    other
                ))
            }
        };

        let metadata = MetadataConfig {
            backend: metadata_backend,
            database_url: lookup("DATABASE_URL"),
            max_connections: var("DB_MAX_CONNECTIONS", "")
                .parse()
                .unwrap_or(MAX_CONNECTIONS),
            timeout_seconds: var("DB_TIMEOUT_SECONDS", "")
                .parse()
                .unwrap_or(CONNECTION_TIMEOUT_SECS),
        };

        Ok(Config {
            server,
            storage,
            public_url,
            limits,
            metadata,
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.limits.max_files_per_request == 0 {
            return Err(anyhow::anyhow!("MAX_FILES_PER_REQUEST must be at least 1"));
        }
        if self.limits.transfer_concurrency == 0 {
            return Err(anyhow::anyhow!("TRANSFER_CONCURRENCY must be at least 1"));
        }
        if self.limits.max_file_size_bytes > self.limits.max_request_size_bytes {
            return Err(anyhow::anyhow!(
                "MAX_FILE_SIZE_MB cannot exceed MAX_REQUEST_SIZE_MB"
            ));
        }

        if self.metadata.backend == MetadataBackend::Postgres {
            match &self.metadata.database_url {
                Some(url) if url.starts_with("postgres://") || url.starts_with("postgresql://") => {
                }
                _ => {
                    return Err(anyhow::anyhow!(
                        "DATABASE_URL must be a valid PostgreSQL connection string"
                    ))
                }
            }
        }

        match self.storage.backend {
            StorageBackend::Local => {
                if self.storage.local.root.as_os_str().is_empty() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH must be set when using local storage backend"
                    ));
                }
            }
            StorageBackend::Remote => {
                let remote = self.storage.remote.as_ref().ok_or_else(|| {
                    anyhow::anyhow!("Remote storage backend selected without remote settings")
                })?;
                if remote.retry.attempts == 0 {
                    return Err(anyhow::anyhow!(
                        "STORAGE_CONNECT_ATTEMPTS must be at least 1"
                    ));
                }
                if !remote.media_root.starts_with('/') {
                    return Err(anyhow::anyhow!("REMOTE_MEDIA_ROOT must be an absolute path"));
                }
            }
        }

        if !self.public_url.default_base.starts_with("http://")
            && !self.public_url.default_base.starts_with("https://")
        {
            return Err(anyhow::anyhow!(
                "PUBLIC_BASE_URL must start with http:// or https://"
            ));
        }

        Ok(())
    }

    /// URL path prefix under which stored objects of the active backend are served
    pub fn public_prefix(&self) -> &str {
        match (&self.storage.backend, &self.storage.remote) {
            (StorageBackend::Remote, Some(remote)) => &remote.public_prefix,
            _ => &self.storage.local.public_prefix,
        }
    }
}

fn is_production_env(environment: &str) -> bool {
    let env = environment.to_lowercase();
    env == "production" || env == "prod"
}

fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}

/// Accepts `644`, `0644` or `0o644`
fn parse_file_mode(raw: &str) -> Option<i32> {
    let digits = raw.trim().trim_start_matches("0o");
    if digits.is_empty() {
        return None;
    }
    i32::from_str_radix(digits, 8).ok()
}

/// Parses `fragment=>https://base;other=>https://base2` into ordered rules.
pub fn parse_domain_rules(raw: &str) -> Result<Vec<DomainRule>, anyhow::Error> {
    raw.split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (fragment, base) = entry.split_once("=>").ok_or_else(|| {
                anyhow::anyhow!(
                    "Invalid PUBLIC_DOMAIN_RULES entry '{}'. Expected 'fragment=>url'",
                    entry
                )
            })?;
            let fragment = fragment.trim().to_lowercase();
            let base = base.trim().trim_end_matches('/').to_string();
            if fragment.is_empty() || base.is_empty() {
                return Err(anyhow::anyhow!(
                    "Invalid PUBLIC_DOMAIN_RULES entry '{}'. Fragment and url are required",
                    entry
                ));
            }
            Ok(DomainRule {
                host_fragment: fragment,
                base_url: base,
            })
        })
        .collect()
}
