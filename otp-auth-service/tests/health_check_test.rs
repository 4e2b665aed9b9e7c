mod common;

use axum::http::{Method, StatusCode};
use common::TestApp;

#[tokio::test]
async fn health_check_returns_200() {
    let app = TestApp::spawn().await;

    let (status, body) = app.request(Method::GET, "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "otp-auth-service-test");
}

#[tokio::test]
async fn database_health_reports_store() {
    let app = TestApp::spawn().await;

    let (status, body) = app.request(Method::GET, "/health/db", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["checks"]["database"], "up");
}

#[tokio::test]
async fn openapi_document_lists_auth_routes() {
    let app = TestApp::spawn().await;

    let (status, body) = app
        .request(Method::GET, "/.well-known/openapi.json", None, None)
        .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/api/v1/auth/send-code"].is_object());
    assert!(body["paths"]["/api/v1/auth/verify-code"].is_object());
}

#[tokio::test]
async fn metrics_without_recorder_is_not_found() {
    let app = TestApp::spawn().await;

    let (status, _) = app.request(Method::GET, "/metrics", None, None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}
