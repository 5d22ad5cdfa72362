//! Integration tests for the book routes over PostgreSQL.
//!
//! Need a live PostgreSQL reachable through `DATABASE_URL`; run with
//! `cargo test -- --ignored`.

mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use folio_store::pg_book_store::PgBookStore;
use sqlx::PgPool;

#[ignore = "requires DATABASE_URL"]
#[sqlx::test(migrations = "../../migrations/catalog")]
async fn test_books_create_update_get_round_trip(pool: PgPool) {
    let broker = common::broker();
    let store = Arc::new(PgBookStore::new(pool));

    // POST /api/v1/books
    let (status, created) = common::send_json(
        common::build_catalog_app(store.clone(), &broker),
        "POST",
        "/api/v1/books",
        &serde_json::json!([{ "title": "Kindred", "author": "Octavia E. Butler" }]),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created[0]["id"].as_str().unwrap().to_owned();

    // PATCH /api/v1/books — clear author, set year
    let (status, outcome) = common::send_json(
        common::build_catalog_app(store.clone(), &broker),
        "PATCH",
        "/api/v1/books",
        &serde_json::json!([{ "id": id, "author": null, "publicationYear": 1979 }]),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["message"], "Books are successfully updated");

    // GET /api/v1/books/{id} — verify persisted state
    let (status, book) = common::get_json(
        common::build_catalog_app(store, &broker),
        &format!("/api/v1/books/{id}"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(book["title"], "Kindred");
    assert!(book["author"].is_null());
    assert_eq!(book["publicationYear"], 1979);

    assert_eq!(broker.ready_count(common::QUEUE), 2);
}
