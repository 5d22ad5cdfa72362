//! Log Entry: the durable, queryable materialization of an Event Record.

use chrono::{DateTime, SubsecRound, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::event::EventRecord;

/// A row in the append-only event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    /// Identifier assigned at ingestion.
    pub id: Uuid,
    /// The record's `occurred_at`, truncated to microseconds.
    pub timestamp: DateTime<Utc>,
    /// Domain concept the event is about.
    pub subject_type: String,
    /// Symbolic event type name, e.g. `"CREATE"`.
    pub event_type: String,
    /// Free-text summary.
    pub description: Option<String>,
}

impl LogEntry {
    /// Materializes `record` under a freshly generated id.
    ///
    /// The timestamp keeps microsecond precision so it survives a round trip
    /// through `TIMESTAMPTZ` unchanged.
    #[must_use]
    pub fn from_record(record: &EventRecord) -> Self {
        Self {
            id: Uuid::now_v7(),
            timestamp: record.occurred_at.trunc_subsecs(6),
            subject_type: record.subject_type.clone(),
            event_type: record.event_type.as_str().to_owned(),
            description: record.description.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Timelike};

    use super::*;
    use crate::event::EventType;

    #[test]
    fn test_from_record_truncates_timestamp_to_microseconds() {
        let occurred_at = Utc
            .with_ymd_and_hms(2026, 1, 15, 10, 0, 0)
            .unwrap()
            .with_nanosecond(123_456_789)
            .unwrap();
        let record = EventRecord {
            occurred_at,
            subject_type: "Book".to_owned(),
            event_type: EventType::Delete,
            description: None,
        };

        let entry = LogEntry::from_record(&record);

        assert_eq!(entry.timestamp.timestamp_subsec_nanos(), 123_456_000);
        assert_eq!(entry.event_type, "DELETE");
        assert_eq!(entry.subject_type, "Book");
    }
}
