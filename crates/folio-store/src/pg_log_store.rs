//! `PostgreSQL` implementation of `LogStore`.
//!
//! The `event_logs` table rejects `UPDATE` and `DELETE` with a trigger, so
//! the only write path is [`LogStore::append`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use folio_core::error::DomainError;
use folio_core::log::LogEntry;
use folio_core::repository::LogStore;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db_error;

/// Column list for `event_logs` queries.
const COLUMNS: &str = "id, timestamp, subject_type, event_type, description";

#[derive(Debug, sqlx::FromRow)]
struct LogRow {
    id: Uuid,
    timestamp: DateTime<Utc>,
    subject_type: String,
    event_type: String,
    description: Option<String>,
}

impl From<LogRow> for LogEntry {
    fn from(row: LogRow) -> Self {
        Self {
            id: row.id,
            timestamp: row.timestamp,
            subject_type: row.subject_type,
            event_type: row.event_type,
            description: row.description,
        }
    }
}

/// PostgreSQL-backed append-only event log.
#[derive(Debug, Clone)]
pub struct PgLogStore {
    pool: PgPool,
}

impl PgLogStore {
    /// Creates a new `PgLogStore`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LogStore for PgLogStore {
    async fn append(&self, entry: &LogEntry) -> Result<(), DomainError> {
        sqlx::query(
            "INSERT INTO event_logs (id, timestamp, subject_type, event_type, description) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(entry.id)
        .bind(entry.timestamp)
        .bind(&entry.subject_type)
        .bind(&entry.event_type)
        .bind(&entry.description)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<LogEntry>, DomainError> {
        let query = format!("SELECT {COLUMNS} FROM event_logs ORDER BY timestamp, id");
        let rows = sqlx::query_as::<_, LogRow>(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(rows.into_iter().map(LogEntry::from).collect())
    }

    async fn list_by_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<LogEntry>, DomainError> {
        if start > end {
            return Ok(Vec::new());
        }
        let query = format!(
            "SELECT {COLUMNS} FROM event_logs \
             WHERE timestamp >= $1 AND timestamp <= $2 \
             ORDER BY timestamp, id"
        );
        let rows = sqlx::query_as::<_, LogRow>(&query)
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(rows.into_iter().map(LogEntry::from).collect())
    }
}
