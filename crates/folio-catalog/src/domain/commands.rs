//! Commands for the book catalog.

use folio_core::book::{BookPatch, NewBook};
use folio_core::command::Command;
use uuid::Uuid;

/// Command to create a batch of books in one transaction.
#[derive(Debug, Clone)]
pub struct CreateBooks {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Candidates to insert.
    pub books: Vec<NewBook>,
}

impl Command for CreateBooks {
    fn command_type(&self) -> &'static str {
        "catalog.create_books"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to partially update a batch of books.
#[derive(Debug, Clone)]
pub struct UpdateBooks {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// One patch per book; a later patch for the same id replaces an earlier one.
    pub patches: Vec<BookPatch>,
}

impl Command for UpdateBooks {
    fn command_type(&self) -> &'static str {
        "catalog.update_books"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to delete one book.
#[derive(Debug, Clone)]
pub struct DeleteBook {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The book to delete.
    pub book_id: Uuid,
}

impl Command for DeleteBook {
    fn command_type(&self) -> &'static str {
        "catalog.delete_book"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}
