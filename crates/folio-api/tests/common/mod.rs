//! Shared test helpers for API integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use folio_api::state::{CatalogState, EventLogState};
use folio_catalog::application::publisher::CommitGatedPublisher;
use folio_core::clock::Clock;
use folio_core::repository::{BookStore, LogStore};
use folio_test_support::FixedClock;
use folio_transport::memory::InMemoryBroker;
use http_body_util::BodyExt;
use tower::ServiceExt;

pub const QUEUE: &str = "book.events.log";
pub const ROUTING_KEY: &str = "book.log";

/// Fixed timestamp used across all integration tests.
pub fn fixed_clock() -> Arc<dyn Clock> {
    Arc::new(FixedClock(
        chrono::TimeZone::with_ymd_and_hms(&chrono::Utc, 2026, 1, 15, 10, 0, 0).unwrap(),
    ))
}

/// A broker with the event log queue bound to the catalog routing key.
pub fn broker() -> InMemoryBroker {
    let broker = InMemoryBroker::new();
    broker.bind(QUEUE, ROUTING_KEY);
    broker
}

/// Build the full catalog router publishing to `broker`. Uses the same
/// route structure as the `catalog-service` binary.
pub fn build_catalog_app(book_store: Arc<dyn BookStore>, broker: &InMemoryBroker) -> Router {
    let clock = fixed_clock();
    let publisher = CommitGatedPublisher::new(Arc::new(broker.publisher(ROUTING_KEY)), clock.clone());
    folio_api::catalog_app(CatalogState::new(clock, book_store, publisher))
}

/// Build the full event log router over `log_store`.
pub fn build_event_log_app(log_store: Arc<dyn LogStore>) -> Router {
    folio_api::event_log_app(EventLogState::new(log_store))
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if body_bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body_bytes).unwrap()
    };

    (status, json)
}

/// Send a request with a JSON body and return the response.
pub async fn send_json(
    app: Router,
    method: &str,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap();
    send(app, request).await
}

/// Send a GET request and return the response.
pub async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

/// Send a DELETE request and return the response.
pub async fn delete(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}
