//! PostgreSQL storage for Folio.
//!
//! [`pg_book_store`] backs the catalog's `BookStore`; [`pg_log_store`] backs
//! the append-only `LogStore`. Each has its own migration set.

use folio_core::error::DomainError;
use sqlx::migrate::Migrator;

pub mod pg_book_store;
pub mod pg_log_store;

/// Migrations for the `books` table.
pub static CATALOG_MIGRATOR: Migrator = sqlx::migrate!("../../migrations/catalog");

/// Migrations for the `event_logs` table.
pub static EVENT_LOG_MIGRATOR: Migrator = sqlx::migrate!("../../migrations/event-log");

pub(crate) fn db_error(e: sqlx::Error) -> DomainError {
    DomainError::Infrastructure(format!("database error: {e}"))
}
