mod helpers;

use helpers::*;
use serde_json::Value;

#[tokio::test]
async fn test_health_reports_backends() {
    let app = setup_test_app().await;

    let response = app.client().get("/health").await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["metadata"], "healthy");
    assert_eq!(body["storage"], "healthy");
    assert_eq!(body["storage_backend"], "local");
    assert_eq!(body["storage_leaks"], 0);
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let app = setup_test_app().await;

    let response = app.client().get("/api/openapi.json").await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert!(body["paths"]["/api/materials"].is_object());
    assert!(body["paths"]["/api/video-works/{id}"].is_object());
}

#[tokio::test]
async fn test_error_details_follow_configured_environment() {
    let missing = "/api/materials/00000000-0000-0000-0000-000000000000";

    let development = setup_test_app().await;
    let response = development.client().get(missing).await;
    response.assert_status_not_found();
    let body: Value = response.json();
    assert_eq!(body["code"], "NOT_FOUND");
    assert_eq!(body["errorType"], "NotFoundError");

    let production = setup_test_app_with(&[
        ("ENVIRONMENT", "production"),
        ("CORS_ORIGINS", "https://classhub.example"),
    ])
    .await;
    let response = production.client().get(missing).await;
    response.assert_status_not_found();
    let body: Value = response.json();
    assert_eq!(body["code"], "NOT_FOUND");
    assert!(body.get("details").is_none());
    assert!(body.get("errorType").is_none());
}
