//! Event Records emitted by the book catalog.

use chrono::{DateTime, Utc};
use folio_core::event::{EventRecord, EventType};
use uuid::Uuid;

/// `subject_type` of every catalog event.
pub const BOOK_SUBJECT_TYPE: &str = "Book";

/// Summary naming every affected id, joined by `", "`.
#[must_use]
pub fn describe(event_type: EventType, book_ids: &[Uuid]) -> String {
    let ids = book_ids
        .iter()
        .map(Uuid::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    match event_type {
        EventType::Create => format!("New books were created with IDs: {ids}"),
        EventType::Update => format!("Books were updated with IDs: {ids}"),
        EventType::Delete => format!("Books were deleted with IDs {ids}"),
    }
}

/// Builds the record for one mutation batch.
#[must_use]
pub fn book_event(
    event_type: EventType,
    book_ids: &[Uuid],
    occurred_at: DateTime<Utc>,
) -> EventRecord {
    EventRecord {
        occurred_at,
        subject_type: BOOK_SUBJECT_TYPE.to_owned(),
        event_type,
        description: Some(describe(event_type, book_ids)),
    }
}
