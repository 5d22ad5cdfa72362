//! Integration tests for the health endpoints.

mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use folio_test_support::{InMemoryBookStore, InMemoryLogStore};

#[tokio::test]
async fn test_catalog_health_returns_200_with_status_ok() {
    let app = common::build_catalog_app(Arc::new(InMemoryBookStore::new()), &common::broker());

    let (status, json) = common::get_json(app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_event_log_health_returns_200_with_status_ok() {
    let app = common::build_event_log_app(Arc::new(InMemoryLogStore::new()));

    let (status, json) = common::get_json(app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_unknown_route_returns_404() {
    let app = common::build_event_log_app(Arc::new(InMemoryLogStore::new()));

    let request = axum::http::Request::builder()
        .method("GET")
        .uri("/api/v1/nonexistent")
        .body(axum::body::Body::empty())
        .unwrap();

    let response = tower::ServiceExt::oneshot(app, request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
