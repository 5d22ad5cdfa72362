//! Routes for the book catalog.

use std::str::FromStr;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Json, Router, routing::get};
use folio_catalog::application::command_handlers::{self, UpdateOutcome};
use folio_catalog::application::query_handlers;
use folio_catalog::domain::commands;
use folio_core::book::{Book, BookFilter, BookPatch, NewBook, Page, PageRequest};
use folio_core::error::DomainError;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::CatalogState;

/// Query string for GET /.
///
/// `sort` may repeat; each occurrence is one `field[,direction]` key, applied
/// in order.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ListBooksParams {
    /// Case-insensitive title substring.
    pub title: Option<String>,
    /// Case-insensitive author substring.
    pub author: Option<String>,
    /// Exact publication year.
    pub publication_year: Option<i32>,
    /// Zero-based page number.
    pub page: Option<i64>,
    /// Page size.
    pub size: Option<i64>,
    /// Sort keys, e.g. `publicationYear,desc`.
    pub sort: Vec<String>,
}

impl ListBooksParams {
    /// Builds the parameters from raw query pairs. Unknown keys are ignored.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if a numeric parameter does not parse.
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Result<Self, DomainError> {
        let mut params = Self::default();
        for (key, value) in pairs {
            match key.as_str() {
                "title" => params.title = Some(value),
                "author" => params.author = Some(value),
                "publicationYear" => params.publication_year = Some(parse_number(&key, &value)?),
                "page" => params.page = Some(parse_number(&key, &value)?),
                "size" => params.size = Some(parse_number(&key, &value)?),
                "sort" => params.sort.push(value),
                _ => {}
            }
        }
        Ok(params)
    }

    fn split(self) -> (BookFilter, PageRequest) {
        let filter = BookFilter {
            title: self.title,
            author: self.author,
            publication_year: self.publication_year,
        };
        let request =
            PageRequest::sanitize(self.page.unwrap_or(0), self.size.unwrap_or(0), &self.sort);
        (filter, request)
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T, DomainError> {
    value.trim().parse().map_err(|_| {
        DomainError::Validation(format!(
            "query parameter {key} must be an integer, got {value:?}"
        ))
    })
}

/// POST /
#[instrument(skip(state, books), fields(count = books.len()))]
async fn create_books(
    State(state): State<CatalogState>,
    Json(books): Json<Vec<NewBook>>,
) -> Result<(StatusCode, Json<Vec<Book>>), ApiError> {
    let command = commands::CreateBooks {
        correlation_id: Uuid::new_v4(),
        books,
    };

    info!(correlation_id = %command.correlation_id, "handling create_books command");

    let created = command_handlers::handle_create_books(
        &command,
        state.clock.as_ref(),
        &*state.book_store,
        &state.publisher,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /
#[instrument(skip(state, pairs))]
async fn list_books(
    State(state): State<CatalogState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<Page<Book>>, ApiError> {
    let (filter, request) = ListBooksParams::from_pairs(pairs)?.split();
    let page = query_handlers::list_books(&filter, &request, &*state.book_store).await?;
    Ok(Json(page))
}

/// GET /{id}
#[instrument(skip(state))]
async fn get_book(
    State(state): State<CatalogState>,
    Path(book_id): Path<Uuid>,
) -> Result<Json<Book>, ApiError> {
    let book = query_handlers::get_book_by_id(book_id, &*state.book_store).await?;
    Ok(Json(book))
}

/// PATCH /
#[instrument(skip(state, patches), fields(count = patches.len()))]
async fn update_books(
    State(state): State<CatalogState>,
    Json(patches): Json<Vec<BookPatch>>,
) -> Result<Json<UpdateOutcome>, ApiError> {
    let command = commands::UpdateBooks {
        correlation_id: Uuid::new_v4(),
        patches,
    };

    info!(correlation_id = %command.correlation_id, "handling update_books command");

    let outcome = command_handlers::handle_update_books(
        &command,
        state.clock.as_ref(),
        &*state.book_store,
        &state.publisher,
    )
    .await?;

    Ok(Json(outcome))
}

/// DELETE /{id}
#[instrument(skip(state))]
async fn delete_book(
    State(state): State<CatalogState>,
    Path(book_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let command = commands::DeleteBook {
        correlation_id: Uuid::new_v4(),
        book_id,
    };

    info!(correlation_id = %command.correlation_id, "handling delete_book command");

    command_handlers::handle_delete_book(&command, &*state.book_store, &state.publisher).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Returns the router for the book catalog.
pub fn router() -> Router<CatalogState> {
    Router::new()
        .route("/", get(list_books).post(create_books).patch(update_books))
        .route("/{id}", get(get_book).delete(delete_book))
}
