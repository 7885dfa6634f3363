//! Test helpers: build AppState and router for integration tests.
//!
//! Every test app gets its own on-disk store in a temporary directory and a manual
//! clock, so expiry can be simulated without waiting.

#![allow(dead_code)]

use axum_test::multipart::{MultipartForm, Part};
use axum_test::{TestResponse, TestServer};
use codedrop_api::setup::{routes, services};
use codedrop_api::state::AppState;
use codedrop_core::{Config, ManualClock};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

/// Test application: server, state and owned resources.
pub struct TestApp {
    pub server: TestServer,
    pub state: Arc<AppState>,
    pub clock: Arc<ManualClock>,
    pub _temp_dir: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    /// Directory holding published payloads and their sidecars.
    pub fn entries_dir(&self) -> PathBuf {
        self._temp_dir.path().join("entries")
    }

    pub fn stored_files(&self) -> usize {
        std::fs::read_dir(self.entries_dir())
            .expect("Failed to read entries directory")
            .count()
    }

    /// Wait for evicted files to be unlinked, then return what is left on disk.
    pub async fn settled_files(&self, expected: usize) -> usize {
        for _ in 0..500 {
            if self.stored_files() == expected {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        self.stored_files()
    }
}

/// Setup test app with default limits and local storage.
pub async fn setup_test_app() -> TestApp {
    setup_test_app_with(&[]).await
}

/// Setup test app, overriding configuration keys (e.g. `MAX_UPLOAD_SIZE_MB`).
pub async fn setup_test_app_with(overrides: &[(&str, &str)]) -> TestApp {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");

    let mut vars: HashMap<String, String> = HashMap::new();
    vars.insert("STORAGE_BACKEND".into(), "local".into());
    vars.insert(
        "LOCAL_STORAGE_PATH".into(),
        temp_dir.path().display().to_string(),
    );
    vars.insert("ENVIRONMENT".into(), "test".into());
    for (key, value) in overrides {
        vars.insert((*key).to_string(), (*value).to_string());
    }

    let config = Config::from_lookup(|key| vars.get(key).cloned()).expect("Invalid test config");
    config.validate().expect("Test config failed validation");

    let clock = Arc::new(ManualClock::default());
    let state = services::initialize_services(&config, clock.clone())
        .await
        .expect("Failed to initialize services");

    let app = routes::setup_routes(&config, state.clone()).expect("Failed to setup routes");
    let server = TestServer::new(app.into_make_service()).expect("Failed to create test server");

    TestApp {
        server,
        state,
        clock,
        _temp_dir: temp_dir,
    }
}

/// Upload `data` as the `file` field.
pub async fn upload(
    client: &TestServer,
    file_name: &str,
    mime_type: &str,
    data: Vec<u8>,
) -> TestResponse {
    let part = Part::bytes(data).file_name(file_name).mime_type(mime_type);
    let form = MultipartForm::new().add_part("file", part);
    client.post("/api/upload").multipart(form).await
}

/// Upload and return the issued code, asserting success.
pub async fn upload_ok(client: &TestServer, file_name: &str, data: Vec<u8>) -> String {
    let response = upload(client, file_name, "application/octet-stream", data).await;
    assert_eq!(response.status_code(), 200, "upload failed: {}", response.text());
    let body: serde_json::Value = response.json();
    body["code"]
        .as_str()
        .expect("Expected 'code' in upload response")
        .to_string()
}
