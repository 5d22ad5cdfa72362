//! Consumer loop binding an [`EventIngestor`] to a subscription.
//!
//! Settlement policy per delivery:
//!
//! | Outcome                                  | Settlement                          |
//! |------------------------------------------|-------------------------------------|
//! | ingested                                 | `ack`                               |
//! | invalid payload                          | `reject(requeue = false)`           |
//! | storage failure                          | backoff, then `reject(requeue = true)` |
//! | `max_attempts` storage failures in a row | `reject(requeue = false)`           |

use std::time::Duration;

use folio_core::error::DomainError;
use folio_core::transport::{Delivery, Subscription};
use tracing::{error, info, warn};

use crate::application::ingestion::EventIngestor;

/// How storage failures are retried before a message is given up on.
///
/// A requeued message goes back to the head of its queue, so consecutive
/// failures count attempts on the same message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per message, including the first, before it is dead-lettered.
    pub max_attempts: u32,
    /// Wait before the first requeue; doubles on each further failure.
    pub initial_backoff: Duration,
    /// Upper bound on the wait.
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// Wait before requeueing after the `attempt`-th consecutive failure.
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(10),
        }
    }
}

/// Counts of how deliveries were settled while the loop ran.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerSummary {
    /// Deliveries ingested and acknowledged.
    pub acked: u64,
    /// Deliveries rejected for redelivery after a storage failure.
    pub requeued: u64,
    /// Deliveries rejected as invalid or after exhausting their attempts.
    pub dead_lettered: u64,
}

/// Processes deliveries one at a time until the subscription closes or
/// fails.
pub async fn run_consumer<S>(
    mut subscription: S,
    ingestor: &EventIngestor,
    retry: RetryPolicy,
) -> ConsumerSummary
where
    S: Subscription,
{
    let mut summary = ConsumerSummary::default();
    let mut failures = 0u32;
    info!(max_attempts = retry.max_attempts, "event log consumer started");

    while let Some(next) = subscription.next().await {
        let delivery = match next {
            Ok(delivery) => delivery,
            Err(e) => {
                error!(error = %e, "failed to receive delivery; stopping consumer");
                break;
            }
        };
        settle(delivery, ingestor, &retry, &mut failures, &mut summary).await;
    }

    info!(
        acked = summary.acked,
        requeued = summary.requeued,
        dead_lettered = summary.dead_lettered,
        "event log consumer stopped"
    );
    summary
}

async fn settle(
    delivery: Box<dyn Delivery>,
    ingestor: &EventIngestor,
    retry: &RetryPolicy,
    failures: &mut u32,
    summary: &mut ConsumerSummary,
) {
    if delivery.redelivered() {
        warn!("processing redelivered message");
    }

    let outcome = ingestor.handle_delivery(delivery.payload()).await;
    let settled = match outcome {
        Ok(_) => {
            *failures = 0;
            summary.acked += 1;
            delivery.ack().await
        }
        Err(DomainError::Validation(reason)) => {
            *failures = 0;
            warn!(%reason, "rejecting invalid event record");
            summary.dead_lettered += 1;
            delivery.reject(false).await
        }
        Err(e) => {
            *failures += 1;
            if *failures >= retry.max_attempts.max(1) {
                error!(
                    error = %e,
                    attempts = *failures,
                    "failed to store event; dead-lettering after repeated failures"
                );
                *failures = 0;
                summary.dead_lettered += 1;
                delivery.reject(false).await
            } else {
                let delay = retry.backoff(*failures);
                error!(
                    error = %e,
                    attempt = *failures,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "failed to store event; requeueing"
                );
                tokio::time::sleep(delay).await;
                summary.requeued += 1;
                delivery.reject(true).await
            }
        }
    };

    if let Err(e) = settled {
        error!(error = %e, "failed to settle delivery");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};
    use folio_core::error::DomainError;
    use folio_core::event::{EventRecord, EventType};
    use folio_core::log::LogEntry;
    use folio_core::repository::LogStore;
    use folio_core::transport::EventPublisher;
    use folio_test_support::InMemoryLogStore;
    use folio_transport::memory::InMemoryBroker;

    use super::{ConsumerSummary, RetryPolicy, run_consumer};
    use crate::application::ingestion::EventIngestor;

    const QUEUE: &str = "book.events.log";

    fn broker() -> InMemoryBroker {
        let broker = InMemoryBroker::new();
        broker.bind(QUEUE, "book.log");
        broker
    }

    fn record() -> EventRecord {
        EventRecord {
            occurred_at: Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
            subject_type: "Book".to_owned(),
            event_type: EventType::Update,
            description: Some("Books were updated with IDs: x".to_owned()),
        }
    }

    fn quick_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(4),
        }
    }

    async fn wait_until(condition: impl Fn() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    /// Fails the first `failures` appends, then delegates.
    struct FlakyLogStore {
        inner: InMemoryLogStore,
        failures: AtomicUsize,
    }

    /// Always fails appends whose description is `poison`.
    struct PoisonLogStore {
        inner: InMemoryLogStore,
        poison: String,
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl LogStore for PoisonLogStore {
        async fn append(&self, entry: &LogEntry) -> Result<(), DomainError> {
            if entry.description.as_deref() == Some(self.poison.as_str()) {
                self.attempts.fetch_add(1, Ordering::SeqCst);
                return Err(DomainError::Infrastructure("value too long for column".into()));
            }
            self.inner.append(entry).await
        }

        async fn list_all(&self) -> Result<Vec<LogEntry>, DomainError> {
            self.inner.list_all().await
        }

        async fn list_by_range(
            &self,
            start: DateTime<Utc>,
            end: DateTime<Utc>,
        ) -> Result<Vec<LogEntry>, DomainError> {
            self.inner.list_by_range(start, end).await
        }
    }

    #[async_trait]
    impl LogStore for FlakyLogStore {
        async fn append(&self, entry: &LogEntry) -> Result<(), DomainError> {
            if self
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(DomainError::Infrastructure("deadlock detected".into()));
            }
            self.inner.append(entry).await
        }

        async fn list_all(&self) -> Result<Vec<LogEntry>, DomainError> {
            self.inner.list_all().await
        }

        async fn list_by_range(
            &self,
            start: DateTime<Utc>,
            end: DateTime<Utc>,
        ) -> Result<Vec<LogEntry>, DomainError> {
            self.inner.list_by_range(start, end).await
        }
    }

    #[tokio::test]
    async fn test_run_consumer_acks_valid_records() {
        // Arrange
        let broker = broker();
        let store = Arc::new(InMemoryLogStore::new());
        let ingestor = EventIngestor::new(store.clone());
        let subscription = broker.subscribe(QUEUE);
        let consumer = tokio::spawn(async move { run_consumer(subscription, &ingestor, quick_retry()).await });

        // Act
        broker.publisher("book.log").publish(&record()).await.unwrap();
        wait_until(|| store.entries().len() == 1).await;
        broker.close();
        let summary = consumer.await.unwrap();

        // Assert
        assert_eq!(
            summary,
            ConsumerSummary {
                acked: 1,
                requeued: 0,
                dead_lettered: 0
            }
        );
        assert_eq!(broker.ready_count(QUEUE), 0);
        assert!(broker.dead_letters(QUEUE).is_empty());
    }

    #[tokio::test]
    async fn test_run_consumer_dead_letters_invalid_records_without_appending() {
        let broker = broker();
        let store = Arc::new(InMemoryLogStore::new());
        let ingestor = EventIngestor::new(store.clone());
        let subscription = broker.subscribe(QUEUE);
        let consumer = tokio::spawn(async move { run_consumer(subscription, &ingestor, quick_retry()).await });

        let invalid = br#"{"occurredAt":"2026-01-15T10:00:00Z","subjectType":"Book"}"#;
        broker.publish_raw("book.log", invalid);
        wait_until(|| broker.dead_letters(QUEUE).len() == 1).await;
        broker.close();
        let summary = consumer.await.unwrap();

        assert_eq!(summary.dead_lettered, 1);
        assert_eq!(summary.acked, 0);
        assert!(store.entries().is_empty());
        assert_eq!(broker.dead_letters(QUEUE), vec![invalid.to_vec()]);
    }

    #[tokio::test]
    async fn test_run_consumer_requeues_on_storage_failure_until_stored() {
        // Arrange
        let broker = broker();
        let store = Arc::new(FlakyLogStore {
            inner: InMemoryLogStore::new(),
            failures: AtomicUsize::new(2),
        });
        let ingestor = EventIngestor::new(store.clone());
        let subscription = broker.subscribe(QUEUE);
        let consumer = tokio::spawn(async move { run_consumer(subscription, &ingestor, quick_retry()).await });

        // Act
        broker.publisher("book.log").publish(&record()).await.unwrap();
        wait_until(|| store.inner.entries().len() == 1).await;
        broker.close();
        let summary = consumer.await.unwrap();

        // Assert
        assert_eq!(summary.requeued, 2);
        assert_eq!(summary.acked, 1);
        assert!(broker.dead_letters(QUEUE).is_empty());
    }

    #[tokio::test]
    async fn test_run_consumer_stops_when_subscription_closes() {
        let broker = broker();
        let ingestor = EventIngestor::new(Arc::new(InMemoryLogStore::new()));
        let subscription = broker.subscribe(QUEUE);
        broker.close();

        let summary = tokio::time::timeout(
            Duration::from_secs(5),
            run_consumer(subscription, &ingestor, quick_retry()),
        )
        .await
        .unwrap();

        assert_eq!(summary, ConsumerSummary::default());
    }

    #[tokio::test]
    async fn test_run_consumer_dead_letters_a_failing_record_and_moves_on() {
        // Arrange
        let broker = broker();
        let poison = EventRecord {
            description: Some("unstorable".to_owned()),
            ..record()
        };
        let store = Arc::new(PoisonLogStore {
            inner: InMemoryLogStore::new(),
            poison: "unstorable".to_owned(),
            attempts: AtomicUsize::new(0),
        });
        let ingestor = EventIngestor::new(store.clone());
        let subscription = broker.subscribe(QUEUE);
        let publisher = broker.publisher("book.log");
        publisher.publish(&poison).await.unwrap();
        publisher.publish(&record()).await.unwrap();

        // Act
        let consumer = tokio::spawn(async move {
            run_consumer(subscription, &ingestor, quick_retry()).await
        });
        wait_until(|| store.inner.entries().len() == 1).await;
        broker.close();
        let summary = consumer.await.unwrap();

        // Assert
        assert_eq!(store.attempts.load(Ordering::SeqCst), 3);
        assert_eq!(
            summary,
            ConsumerSummary {
                acked: 1,
                requeued: 2,
                dead_lettered: 1
            }
        );
        assert_eq!(broker.dead_letters(QUEUE), vec![poison.to_json().unwrap()]);
        assert_eq!(
            store.inner.entries()[0].description,
            record().description
        );
    }

    #[test]
    fn test_retry_backoff_doubles_up_to_the_cap() {
        let retry = RetryPolicy {
            max_attempts: 10,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(350),
        };

        assert_eq!(retry.backoff(1), Duration::from_millis(100));
        assert_eq!(retry.backoff(2), Duration::from_millis(200));
        assert_eq!(retry.backoff(3), Duration::from_millis(350));
        assert_eq!(retry.backoff(64), Duration::from_millis(350));
    }
}
