//! Event Record: the transport representation of a completed mutation.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Kind of mutation an event describes.
///
/// Serialized as its symbolic name (`"CREATE"`, `"UPDATE"`, `"DELETE"`).
/// Any other value is rejected during deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventType {
    /// One or more entities were created.
    Create,
    /// One or more entities were updated.
    Update,
    /// An entity was deleted.
    Delete,
}

impl EventType {
    /// All variants, in declaration order.
    pub const ALL: [Self; 3] = [Self::Create, Self::Update, Self::Delete];

    /// The symbolic name stored in log entries and sent on the wire.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }

    /// Human-readable name.
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Create => "Create",
            Self::Update => "Update",
            Self::Delete => "Delete",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| DomainError::Validation(format!("unknown event type: {s:?}")))
    }
}

/// Immutable notification describing one mutation batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    /// Publication time, stamped after the originating transaction committed.
    #[serde(alias = "timestamp")]
    pub occurred_at: DateTime<Utc>,
    /// Domain concept the event is about, e.g. `"Book"`.
    pub subject_type: String,
    /// Kind of mutation.
    pub event_type: EventType,
    /// Free-text summary; may name several affected ids.
    #[serde(default, alias = "eventDescription")]
    pub description: Option<String>,
}

impl EventRecord {
    /// Content type declared to the transport for [`EventRecord::to_json`].
    pub const CONTENT_TYPE: &'static str = "application/json";

    /// Serializes the record to its JSON wire form.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if serialization fails.
    pub fn to_json(&self) -> Result<Vec<u8>, DomainError> {
        serde_json::to_vec(self)
            .map_err(|e| DomainError::Infrastructure(format!("event serialization failed: {e}")))
    }

    /// Parses a record from its JSON wire form.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the payload is not valid JSON or
    /// a required field is missing, null or carries an unknown value.
    pub fn from_json(payload: &[u8]) -> Result<Self, DomainError> {
        serde_json::from_slice(payload)
            .map_err(|e| DomainError::Validation(format!("invalid event record: {e}")))
    }
}
