//! Query handlers for the event log.
//!
//! Both queries return entries ordered by `(timestamp, id)`.

use chrono::{DateTime, Utc};
use folio_core::error::DomainError;
use folio_core::log::LogEntry;
use folio_core::repository::LogStore;
use serde::Serialize;
use uuid::Uuid;

/// Read-only view of a Log Entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventLogView {
    /// Entry identifier.
    pub id: Uuid,
    /// Time the event was published.
    pub timestamp: DateTime<Utc>,
    /// Domain concept the event is about.
    pub subject_type: String,
    /// Symbolic event type name.
    pub event_type: String,
    /// Free-text summary.
    pub description: Option<String>,
}

impl From<LogEntry> for EventLogView {
    fn from(entry: LogEntry) -> Self {
        Self {
            id: entry.id,
            timestamp: entry.timestamp,
            subject_type: entry.subject_type,
            event_type: entry.event_type,
            description: entry.description,
        }
    }
}

/// Lists every entry in the log.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if the store fails.
pub async fn list_all_events(store: &dyn LogStore) -> Result<Vec<EventLogView>, DomainError> {
    let entries = store.list_all().await?;
    Ok(entries.into_iter().map(EventLogView::from).collect())
}

/// Lists the entries with `start <= timestamp <= end`.
///
/// An inverted range yields an empty list rather than an error.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if the store fails.
pub async fn list_events_by_range(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    store: &dyn LogStore,
) -> Result<Vec<EventLogView>, DomainError> {
    if start > end {
        return Ok(Vec::new());
    }
    let entries = store.list_by_range(start, end).await?;
    Ok(entries.into_iter().map(EventLogView::from).collect())
}
