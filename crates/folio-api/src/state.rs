//! Shared application state.

use std::sync::Arc;

use folio_catalog::application::publisher::CommitGatedPublisher;
use folio_core::clock::Clock;
use folio_core::repository::{BookStore, LogStore};

/// State shared across catalog request handlers.
#[derive(Clone)]
pub struct CatalogState {
    /// Clock used for entity timestamps.
    pub clock: Arc<dyn Clock>,
    /// Primary entity store.
    pub book_store: Arc<dyn BookStore>,
    /// Publisher for post-commit Event Records.
    pub publisher: CommitGatedPublisher,
}

impl CatalogState {
    /// Create new catalog state.
    #[must_use]
    pub fn new(
        clock: Arc<dyn Clock>,
        book_store: Arc<dyn BookStore>,
        publisher: CommitGatedPublisher,
    ) -> Self {
        Self {
            clock,
            book_store,
            publisher,
        }
    }
}

/// State shared across event log request handlers.
#[derive(Clone)]
pub struct EventLogState {
    /// Append-only log of ingested events.
    pub log_store: Arc<dyn LogStore>,
}

impl EventLogState {
    /// Create new event log state.
    #[must_use]
    pub fn new(log_store: Arc<dyn LogStore>) -> Self {
        Self { log_store }
    }
}

impl std::fmt::Debug for CatalogState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogState")
            .field("publisher", &self.publisher)
            .finish_non_exhaustive()
    }
}

impl std::fmt::Debug for EventLogState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLogState").finish_non_exhaustive()
    }
}
