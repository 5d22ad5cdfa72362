//! Test log stores — `LogStore` implementations for tests.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use folio_core::error::DomainError;
use folio_core::log::LogEntry;
use folio_core::repository::LogStore;

/// An in-memory append-only log.
#[derive(Debug, Default)]
pub struct InMemoryLogStore {
    entries: Mutex<Vec<LogEntry>>,
}

impl InMemoryLogStore {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a log pre-populated with `entries`.
    #[must_use]
    pub fn with_entries(entries: Vec<LogEntry>) -> Self {
        Self {
            entries: Mutex::new(entries),
        }
    }

    /// Returns a snapshot of all entries in append order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().unwrap().clone()
    }

    fn sorted(&self, keep: impl Fn(&LogEntry) -> bool) -> Vec<LogEntry> {
        let mut out: Vec<LogEntry> = self
            .entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| keep(e))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));
        out
    }
}

#[async_trait]
impl LogStore for InMemoryLogStore {
    async fn append(&self, entry: &LogEntry) -> Result<(), DomainError> {
        self.entries.lock().unwrap().push(entry.clone());
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<LogEntry>, DomainError> {
        Ok(self.sorted(|_| true))
    }

    async fn list_by_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<LogEntry>, DomainError> {
        if start > end {
            return Ok(Vec::new());
        }
        Ok(self.sorted(|e| e.timestamp >= start && e.timestamp <= end))
    }
}

/// A log store that always returns an infrastructure error.
#[derive(Debug)]
pub struct FailingLogStore;

#[async_trait]
impl LogStore for FailingLogStore {
    async fn append(&self, _entry: &LogEntry) -> Result<(), DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn list_all(&self) -> Result<Vec<LogEntry>, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn list_by_range(
        &self,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> Result<Vec<LogEntry>, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }
}
