//! Test publishers — `EventPublisher` implementations for tests.

use std::sync::Mutex;

use async_trait::async_trait;
use folio_core::event::EventRecord;
use folio_core::transport::{EventPublisher, TransportError};

/// A publisher that records every published record and always succeeds.
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    published: Mutex<Vec<EventRecord>>,
}

impl RecordingPublisher {
    /// Creates an empty recording publisher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of everything published so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn published(&self) -> Vec<EventRecord> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, record: &EventRecord) -> Result<(), TransportError> {
        self.published.lock().unwrap().push(record.clone());
        Ok(())
    }
}

/// A publisher whose broker is always unreachable.
#[derive(Debug)]
pub struct FailingPublisher;

#[async_trait]
impl EventPublisher for FailingPublisher {
    async fn publish(&self, _record: &EventRecord) -> Result<(), TransportError> {
        Err(TransportError::Publish("connection refused".into()))
    }
}

/// A publisher whose publish never completes. Useful for exercising
/// publish timeouts.
#[derive(Debug)]
pub struct PendingPublisher;

#[async_trait]
impl EventPublisher for PendingPublisher {
    async fn publish(&self, _record: &EventRecord) -> Result<(), TransportError> {
        std::future::pending().await
    }
}
