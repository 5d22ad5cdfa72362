//! Commit-gated publication of catalog events.
//!
//! Handlers never talk to the transport directly. They call
//! [`CommitGatedPublisher::schedule`] inside their unit of work, which
//! registers a post-commit hook. The record is built and sent only when that
//! hook runs, i.e. after the storage engine has confirmed the commit.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use folio_core::clock::Clock;
use folio_core::event::EventType;
use folio_core::transaction::{Transaction, UnitOfWork};
use folio_core::transport::{EventPublisher, TransportError};
use tracing::{error, info};
use uuid::Uuid;

use crate::domain::events::book_event;

/// Publishes one Event Record per committed mutation batch.
///
/// Send failures are logged and swallowed: the mutation has already
/// committed and stays committed; only its notification is lost.
#[derive(Clone)]
pub struct CommitGatedPublisher {
    publisher: Arc<dyn EventPublisher>,
    clock: Arc<dyn Clock>,
    timeout: Duration,
}

impl CommitGatedPublisher {
    /// Upper bound on a single publish unless overridden.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

    /// Creates a publisher that stamps records with `clock` at send time.
    #[must_use]
    pub fn new(publisher: Arc<dyn EventPublisher>, clock: Arc<dyn Clock>) -> Self {
        Self {
            publisher,
            clock,
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    /// Overrides the publish timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Registers the publication of one `event_type` record naming
    /// `book_ids` to run after `uow` commits.
    pub fn schedule<T>(&self, uow: &mut UnitOfWork<T>, event_type: EventType, book_ids: Vec<Uuid>)
    where
        T: Transaction + ?Sized,
    {
        let this = self.clone();
        uow.after_commit(async move { this.send(event_type, &book_ids).await });
    }

    async fn send(&self, event_type: EventType, book_ids: &[Uuid]) {
        let record = book_event(event_type, book_ids, self.clock.now());
        let outcome = match tokio::time::timeout(self.timeout, self.publisher.publish(&record)).await
        {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(self.timeout)),
        };

        match outcome {
            Ok(()) => info!(
                event_type = %record.event_type,
                subject_type = %record.subject_type,
                occurred_at = %record.occurred_at,
                "sent event"
            ),
            Err(e) => error!(
                error = %e,
                event_type = %record.event_type,
                subject_type = %record.subject_type,
                occurred_at = %record.occurred_at,
                description = record.description.as_deref().unwrap_or_default(),
                "failed to publish event"
            ),
        }
    }
}

impl fmt::Debug for CommitGatedPublisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommitGatedPublisher")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
