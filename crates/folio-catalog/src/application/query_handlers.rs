//! Query handlers for the book catalog.

use folio_core::book::{Book, BookFilter, Page, PageRequest};
use folio_core::error::DomainError;
use folio_core::repository::BookStore;
use uuid::Uuid;

/// Retrieves a book by id.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if no book has the id.
pub async fn get_book_by_id(book_id: Uuid, store: &dyn BookStore) -> Result<Book, DomainError> {
    store
        .find_by_id(book_id)
        .await?
        .ok_or(DomainError::NotFound(book_id))
}

/// Lists one page of books matching `filter`.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if the store fails.
pub async fn list_books(
    filter: &BookFilter,
    request: &PageRequest,
    store: &dyn BookStore,
) -> Result<Page<Book>, DomainError> {
    store.find_page(filter, request).await
}
