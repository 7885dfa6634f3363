//! Exchange API integration tests.
//!
//! Run with: `cargo test -p codedrop-api --test exchange_test`

mod helpers;

use axum_test::multipart::{MultipartForm, Part};
use chrono::Duration;
use helpers::{setup_test_app, setup_test_app_with, upload, upload_ok};
use serde_json::Value;

#[tokio::test]
async fn test_text_file_round_trip() {
    let app = setup_test_app().await;
    let client = app.client();

    let response = upload(client, "a.txt", "text/plain", b"hello code".to_vec()).await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["fileName"], "a.txt");
    assert_eq!(body["fileSize"], 10);
    assert!(body["expiresAt"].is_string());
    let code = body["code"].as_str().unwrap().to_string();
    assert_eq!(code.len(), 8);
    assert!(code
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));

    let info = client.get(&format!("/api/file/{}/info", code)).await;
    assert_eq!(info.status_code(), 200);
    let info: Value = info.json();
    assert_eq!(info["success"], true);
    assert_eq!(info["fileName"], "a.txt");
    assert_eq!(info["fileSize"], 10);
    assert_eq!(info["contentType"], "text/plain");
    assert!(info["uploadTime"].is_string());

    let download = client.get(&format!("/api/download/{}", code)).await;
    assert_eq!(download.status_code(), 200);
    assert_eq!(download.as_bytes().as_ref(), b"hello code");
    assert_eq!(download.header("content-type"), "text/plain");
    let disposition = download.header("content-disposition");
    assert!(disposition.to_str().unwrap().contains("filename=\"a.txt\""));
}

#[tokio::test]
async fn test_codes_are_case_insensitive() {
    let app = setup_test_app().await;
    let client = app.client();

    let code = upload_ok(client, "b.bin", vec![1, 2, 3]).await;

    let response = client
        .get(&format!("/api/file/{}/info", code.to_lowercase()))
        .await;
    assert_eq!(response.status_code(), 200);

    let response = client
        .get(&format!("/api/download/{}", code.to_lowercase()))
        .await;
    assert_eq!(response.as_bytes().as_ref(), &[1, 2, 3]);
}

#[tokio::test]
async fn test_malformed_code_is_bad_request() {
    let app = setup_test_app().await;

    let response = app.client().get("/api/file/1234/info").await;
    assert_eq!(response.status_code(), 400);
    let body: Value = response.json();
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "File not found or expired");
    assert_eq!(body["errorCode"], "INVALID_CODE");
}

#[tokio::test]
async fn test_unknown_code_is_not_found() {
    let app = setup_test_app().await;

    for path in ["/api/file/ZZZZ9999/info", "/api/download/ZZZZ9999"] {
        let response = app.client().get(path).await;
        assert_eq!(response.status_code(), 404, "{}", path);
        let body: Value = response.json();
        assert_eq!(body["message"], "File not found or expired");
        assert_eq!(body["errorCode"], "NOT_FOUND");
    }
}

#[tokio::test]
async fn test_expired_file_is_gone_after_reaper_cycle() {
    let app = setup_test_app().await;
    let client = app.client();

    let code = upload_ok(client, "a.txt", b"0123456789".to_vec()).await;
    assert_eq!(app.stored_files(), 2);

    app.clock.advance(Duration::hours(24));

    let response = client.get(&format!("/api/file/{}/info", code)).await;
    assert_eq!(response.status_code(), 404);
    let response = client.get(&format!("/api/download/{}", code)).await;
    assert_eq!(response.status_code(), 404);

    let report = app.state.reaper.run_once().await.unwrap();
    assert_eq!(report.evicted, 1);
    assert_eq!(app.settled_files(0).await, 0);

    let stats: Value = client.get("/api/stats").await.json();
    assert_eq!(stats["activeFiles"], 0);
}

#[tokio::test]
async fn test_oversize_upload_is_rejected() {
    let app = setup_test_app_with(&[("MAX_UPLOAD_SIZE_MB", "1")]).await;
    let client = app.client();

    let response = upload(
        client,
        "big.bin",
        "application/octet-stream",
        vec![0u8; 1024 * 1024 + 1],
    )
    .await;
    assert_eq!(response.status_code(), 413);
    let body: Value = response.json();
    assert_eq!(body["errorCode"], "PAYLOAD_TOO_LARGE");

    let stats: Value = client.get("/api/stats").await.json();
    assert_eq!(stats["activeFiles"], 0);
    assert_eq!(app.stored_files(), 0);
}

#[tokio::test]
async fn test_upload_at_limit_is_accepted() {
    let app = setup_test_app_with(&[("MAX_UPLOAD_SIZE_MB", "1")]).await;

    let code = upload_ok(app.client(), "exact.bin", vec![7u8; 1024 * 1024]).await;
    let info: Value = app
        .client()
        .get(&format!("/api/file/{}/info", code))
        .await
        .json();
    assert_eq!(info["fileSize"], 1024 * 1024);
}

#[tokio::test]
async fn test_request_far_over_limit_is_rejected() {
    let app = setup_test_app_with(&[("MAX_UPLOAD_SIZE_MB", "1")]).await;

    let response = upload(
        app.client(),
        "huge.bin",
        "application/octet-stream",
        vec![0u8; 3 * 1024 * 1024],
    )
    .await;
    assert_eq!(response.status_code(), 413);
    let body: Value = serde_json::from_str(&response.text()).expect("413 body should be JSON");
    assert_eq!(body["success"], false);
    assert_eq!(body["errorCode"], "PAYLOAD_TOO_LARGE");
    assert_eq!(app.stored_files(), 0);
}

#[tokio::test]
async fn test_oversized_request_body_is_reported_as_json() {
    let app = setup_test_app_with(&[("MAX_UPLOAD_SIZE_MB", "1")]).await;

    // The file itself is tiny; the form around it exceeds the request body limit.
    let form = MultipartForm::new()
        .add_text("padding", "x".repeat(3 * 1024 * 1024))
        .add_part(
            "file",
            Part::bytes(b"small".to_vec())
                .file_name("small.txt")
                .mime_type("text/plain"),
        );
    let response = app.client().post("/api/upload").multipart(form).await;

    assert_eq!(response.status_code(), 413);
    let body: Value = serde_json::from_str(&response.text()).expect("413 body should be JSON");
    assert_eq!(body["success"], false);
    assert_eq!(body["errorCode"], "PAYLOAD_TOO_LARGE");
    assert_eq!(app.stored_files(), 0);
}

#[tokio::test]
async fn test_missing_file_field_is_rejected() {
    let app = setup_test_app().await;

    let form = MultipartForm::new().add_text("note", "no file here");
    let response = app.client().post("/api/upload").multipart(form).await;
    assert_eq!(response.status_code(), 400);
    let body: Value = response.json();
    assert_eq!(body["errorCode"], "INVALID_INPUT");
    assert_eq!(body["message"], "No file provided");
}

#[tokio::test]
async fn test_empty_file_is_rejected() {
    let app = setup_test_app().await;

    let response = upload(app.client(), "empty.txt", "text/plain", Vec::new()).await;
    assert_eq!(response.status_code(), 400);
    let body: Value = response.json();
    assert_eq!(body["message"], "File is empty");
    assert_eq!(app.stored_files(), 0);
}

#[tokio::test]
async fn test_delete_file() {
    let app = setup_test_app().await;
    let client = app.client();

    let code = upload_ok(client, "gone.txt", b"bye".to_vec()).await;

    let response = client.delete(&format!("/api/file/{}", code)).await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "File deleted successfully");
    assert_eq!(app.settled_files(0).await, 0);

    let response = client.get(&format!("/api/download/{}", code)).await;
    assert_eq!(response.status_code(), 404);

    let response = client.delete(&format!("/api/file/{}", code)).await;
    assert_eq!(response.status_code(), 404);
}

#[tokio::test]
async fn test_stats_count_live_files() {
    let app = setup_test_app().await;
    let client = app.client();

    upload_ok(client, "one.txt", b"1".to_vec()).await;
    upload_ok(client, "two.txt", b"2".to_vec()).await;

    let response = client.get("/api/stats").await;
    assert_eq!(response.status_code(), 200);
    let stats: Value = response.json();
    assert_eq!(stats["activeFiles"], 2);
    assert!(stats["timestamp"].as_i64().unwrap() > 0);
}

#[tokio::test]
async fn test_uploads_receive_distinct_codes() {
    let app = setup_test_app().await;

    let mut codes = std::collections::HashSet::new();
    for i in 0..20u8 {
        let code = upload_ok(app.client(), "n.bin", vec![i]).await;
        assert!(codes.insert(code));
    }
}

#[tokio::test]
async fn test_health_and_openapi() {
    let app = setup_test_app().await;

    let response = app.client().get("/health").await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["storage"], "healthy");

    let response = app.client().get("/api/openapi.json").await;
    assert_eq!(response.status_code(), 200);
    let spec: Value = response.json();
    assert!(spec["paths"]["/api/upload"].is_object());
}

#[tokio::test]
async fn test_responses_carry_request_id_and_security_headers() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .get("/api/stats")
        .add_header("X-Request-ID", "it-works-42")
        .await;
    assert_eq!(response.header("x-request-id"), "it-works-42");
    assert_eq!(response.header("x-content-type-options"), "nosniff");
}
