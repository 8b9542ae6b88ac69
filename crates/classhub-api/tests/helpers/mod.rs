//! Shared harness for the HTTP tests: a router over a temp-dir local backend and the
//! in-memory metadata store, with a storage wrapper that can be told to fail.

#![allow(dead_code)]

pub mod storage;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use classhub_api::setup::routes::setup_routes;
use classhub_api::AppState;
use classhub_core::Config;
use classhub_db::InMemoryMetadataStore;
use classhub_storage::{LocalStorage, Storage};
use serde_json::Value;
use tempfile::TempDir;
use uuid::Uuid;

pub use storage::FaultyStorage;

pub const PUBLIC_BASE: &str = "http://media.test";

pub struct TestApp {
    pub server: TestServer,
    pub state: Arc<AppState>,
    pub storage: Arc<FaultyStorage>,
    pub root: PathBuf,
    _temp_dir: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    /// Every stored object as a path relative to the storage root, sorted
    pub fn stored_files(&self) -> Vec<String> {
        let mut files = Vec::new();
        collect_files(&self.root, &self.root, &mut files);
        files.sort();
        files
    }

    pub fn stored_in(&self, directory: &str) -> Vec<String> {
        self.stored_files()
            .into_iter()
            .filter(|f| f.starts_with(&format!("{}/", directory)))
            .collect()
    }

    pub fn exists_on_disk(&self, key: &str) -> bool {
        self.root.join(key).is_file()
    }

    /// Create a practice through the API with `task.pdf` as its file
    pub async fn create_practice(&self, title: &str) -> Uuid {
        let form = MultipartForm::new()
            .add_text("title", title.to_string())
            .add_part("file", pdf("task.pdf"));
        let body: Value = self.server.post("/api/practices").multipart(form).await.json();
        data(&body)["id"]
            .as_str()
            .and_then(|id| id.parse().ok())
            .expect("practice without id")
    }
}

fn collect_files(root: &Path, dir: &Path, out: &mut Vec<String>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return,
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_files(root, &path, out);
        } else if let Ok(relative) = path.strip_prefix(root) {
            out.push(relative.to_string_lossy().replace('\\', "/"));
        }
    }
}

pub async fn setup_test_app() -> TestApp {
    setup_test_app_with(&[]).await
}

/// Build the app with extra environment overrides on top of the test defaults
pub async fn setup_test_app_with(overrides: &[(&str, &str)]) -> TestApp {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let root = temp_dir.path().join("media");

    let mut env: HashMap<String, String> = HashMap::from([
        ("ENVIRONMENT".to_string(), "test".to_string()),
        ("STORAGE_BACKEND".to_string(), "local".to_string()),
        (
            "LOCAL_STORAGE_PATH".to_string(),
            root.to_string_lossy().to_string(),
        ),
        ("LOCAL_PUBLIC_PREFIX".to_string(), "/media".to_string()),
        ("METADATA_BACKEND".to_string(), "memory".to_string()),
        ("PUBLIC_BASE_URL".to_string(), PUBLIC_BASE.to_string()),
    ]);
    for (key, value) in overrides {
        env.insert(key.to_string(), value.to_string());
    }

    let config = Config::from_lookup(|key| env.get(key).cloned()).expect("Invalid test config");
    config.validate().expect("Test config failed validation");

    let local = LocalStorage::new(&root, "/media".to_string())
        .await
        .expect("Failed to create local storage");
    let storage = Arc::new(FaultyStorage::new(local));
    let store = Arc::new(InMemoryMetadataStore::new());

    let state = Arc::new(AppState::new(
        config.clone(),
        storage.clone() as Arc<dyn Storage>,
        store,
    ));
    let router = setup_routes(&config, state.clone()).expect("Failed to build router");
    let server = TestServer::new(router).expect("Failed to start test server");

    TestApp {
        server,
        state,
        storage,
        root,
        _temp_dir: temp_dir,
    }
}

pub fn file_part(name: &str, mime: &str, bytes: &[u8]) -> Part {
    Part::bytes(bytes.to_vec())
        .file_name(name.to_string())
        .mime_type(mime.to_string())
}

pub fn pdf(name: &str) -> Part {
    file_part(name, "application/pdf", b"%PDF-1.4 test document")
}

pub fn png(name: &str) -> Part {
    file_part(name, "image/png", &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a])
}

pub fn mp4(name: &str) -> Part {
    file_part(name, "video/mp4", b"\x00\x00\x00\x18ftypmp42 test video")
}

pub fn mp3(name: &str) -> Part {
    file_part(name, "audio/mpeg", b"ID3 test audio")
}

pub fn material_form(title: &str, content: &str) -> MultipartForm {
    MultipartForm::new()
        .add_text("title", title.to_string())
        .add_text("description", "Week one reading".to_string())
        .add_text("content", content.to_string())
}

/// `data` of a success envelope
pub fn data(body: &Value) -> &Value {
    assert_eq!(body["status"], "success", "unexpected body: {}", body);
    &body["data"]
}

/// Storage key of an asset, from its `storedPath`
pub fn stored_path(asset: &Value) -> String {
    asset["storedPath"]
        .as_str()
        .expect("asset without storedPath")
        .to_string()
}

/// URL path of a public URL produced for the default base
pub fn url_path(url: &str) -> String {
    url.strip_prefix(PUBLIC_BASE)
        .unwrap_or_else(|| panic!("url {} not under {}", url, PUBLIC_BASE))
        .to_string()
}
