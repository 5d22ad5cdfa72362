//! Ingestion Handler: Event Record in, one Log Entry out.

use std::sync::Arc;

use folio_core::error::DomainError;
use folio_core::event::EventRecord;
use folio_core::log::LogEntry;
use folio_core::repository::LogStore;
use tracing::info;

/// Longest `subjectType` the log stores, in characters.
pub const MAX_SUBJECT_TYPE_LEN: usize = 255;

/// Decodes and validates a message body.
///
/// # Errors
///
/// Returns `DomainError::Validation` if the payload is not a well-formed
/// Event Record: malformed JSON, a missing, null or unknown `eventType`, a
/// missing `occurredAt`, or a `subjectType` that is blank or longer than
/// [`MAX_SUBJECT_TYPE_LEN`].
pub fn decode_event_record(payload: &[u8]) -> Result<EventRecord, DomainError> {
    let record = EventRecord::from_json(payload)?;
    if record.subject_type.trim().is_empty() {
        return Err(DomainError::Validation(
            "invalid event record: subjectType is blank".to_owned(),
        ));
    }
    if record.subject_type.chars().count() > MAX_SUBJECT_TYPE_LEN {
        return Err(DomainError::Validation(format!(
            "invalid event record: subjectType exceeds {MAX_SUBJECT_TYPE_LEN} characters"
        )));
    }
    Ok(record)
}

/// Appends ingested Event Records to a [`LogStore`].
///
/// There is no de-duplication: ingesting the same record twice produces two
/// entries with distinct ids.
#[derive(Clone)]
pub struct EventIngestor {
    store: Arc<dyn LogStore>,
}

impl EventIngestor {
    /// Creates an ingestor writing to `store`.
    #[must_use]
    pub fn new(store: Arc<dyn LogStore>) -> Self {
        Self { store }
    }

    /// Appends exactly one entry for `record`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the append fails.
    pub async fn ingest(&self, record: &EventRecord) -> Result<LogEntry, DomainError> {
        let entry = LogEntry::from_record(record);
        self.store.append(&entry).await?;
        info!(
            entry_id = %entry.id,
            event_type = %entry.event_type,
            subject_type = %entry.subject_type,
            timestamp = %entry.timestamp,
            "ingested event"
        );
        Ok(entry)
    }

    /// Decodes `payload` and ingests it.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` without touching the store if the
    /// payload is invalid, otherwise whatever [`EventIngestor::ingest`]
    /// returns.
    pub async fn handle_delivery(&self, payload: &[u8]) -> Result<LogEntry, DomainError> {
        let record = decode_event_record(payload)?;
        self.ingest(&record).await
    }
}

impl std::fmt::Debug for EventIngestor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventIngestor").finish_non_exhaustive()
    }
}
