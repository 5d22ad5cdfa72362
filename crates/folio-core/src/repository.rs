//! Storage abstractions for the book catalog and the event log.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::book::{Book, BookFilter, NewBook, Page, PageRequest};
use crate::error::DomainError;
use crate::log::LogEntry;
use crate::transaction::Transaction;

/// Primary entity store for books.
///
/// Reads go straight to the store. Mutations go through a
/// [`BookTransaction`] obtained from [`BookStore::begin`].
#[async_trait]
pub trait BookStore: Send + Sync {
    /// Opens a new transaction.
    async fn begin(&self) -> Result<Box<dyn BookTransaction>, DomainError>;

    /// Loads one book by id.
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Book>, DomainError>;

    /// Loads one page of books matching `filter`.
    async fn find_page(
        &self,
        filter: &BookFilter,
        request: &PageRequest,
    ) -> Result<Page<Book>, DomainError>;
}

/// Book mutations scoped to one storage transaction.
///
/// Nothing written through this handle is visible to other callers until
/// [`Transaction::commit`] succeeds.
#[async_trait]
pub trait BookTransaction: Transaction {
    /// Inserts a book, assigning it a new id and `now` as both timestamps.
    async fn insert(&mut self, book: &NewBook, now: DateTime<Utc>) -> Result<Book, DomainError>;

    /// Loads the books among `ids` that exist, locking them for update.
    async fn find_many_for_update(&mut self, ids: &[Uuid]) -> Result<Vec<Book>, DomainError>;

    /// Loads one book, locking it for update.
    async fn find_for_update(&mut self, id: Uuid) -> Result<Option<Book>, DomainError>;

    /// Overwrites the stored attributes of an existing book.
    async fn save(&mut self, book: &Book) -> Result<(), DomainError>;

    /// Removes a book. Returns `false` if it did not exist.
    async fn delete(&mut self, id: Uuid) -> Result<bool, DomainError>;
}

/// Append-only store of ingested events.
///
/// Entries are never updated or deleted once appended.
#[async_trait]
pub trait LogStore: Send + Sync {
    /// Inserts a new entry.
    async fn append(&self, entry: &LogEntry) -> Result<(), DomainError>;

    /// Returns every entry ordered by `(timestamp, id)`.
    async fn list_all(&self) -> Result<Vec<LogEntry>, DomainError>;

    /// Returns the entries with `start <= timestamp <= end`, ordered by
    /// `(timestamp, id)`. Empty when `start > end`.
    async fn list_by_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<LogEntry>, DomainError>;
}
