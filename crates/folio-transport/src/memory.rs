//! In-process durable topic broker.
//!
//! Mirrors the AMQP topology used in production: publishes go to a topic
//! exchange, each bound queue keeps its own copy until a consumer
//! acknowledges it, and an unacknowledged delivery is redelivered.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use folio_core::event::EventRecord;
use folio_core::transport::{Delivery, EventPublisher, Subscription, TransportError};
use tokio::sync::Notify;
use tracing::debug;

use crate::topic::topic_matches;

#[derive(Debug, Clone)]
struct Message {
    payload: Vec<u8>,
    redelivered: bool,
}

#[derive(Debug, Default)]
struct Queue {
    ready: Mutex<VecDeque<Message>>,
    dead_letters: Mutex<Vec<Message>>,
    notify: Notify,
    closed: AtomicBool,
}

impl Queue {
    fn ready(&self) -> MutexGuard<'_, VecDeque<Message>> {
        self.ready.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push_back(&self, message: Message) {
        self.ready().push_back(message);
        self.notify.notify_waiters();
    }

    fn requeue(&self, mut message: Message) {
        message.redelivered = true;
        self.ready().push_front(message);
        self.notify.notify_waiters();
    }

    fn dead_letter(&self, message: Message) {
        self.dead_letters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message);
    }
}

#[derive(Debug, Default)]
struct Topology {
    queues: HashMap<String, Arc<Queue>>,
    bindings: Vec<(String, String)>,
}

/// An in-process topic exchange with durable queues.
///
/// Cloning yields another handle to the same broker.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBroker {
    topology: Arc<Mutex<Topology>>,
}

impl InMemoryBroker {
    /// Creates an empty broker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn topology(&self) -> MutexGuard<'_, Topology> {
        self.topology.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn queue(&self, name: &str) -> Arc<Queue> {
        Arc::clone(self.topology().queues.entry(name.to_owned()).or_default())
    }

    /// Declares `queue` if needed and binds it to the exchange with a topic
    /// routing `pattern`.
    pub fn bind(&self, queue: &str, pattern: &str) {
        let mut topology = self.topology();
        topology.queues.entry(queue.to_owned()).or_default();
        topology
            .bindings
            .push((queue.to_owned(), pattern.to_owned()));
    }

    /// Routes a raw payload to every queue with a matching binding. Returns
    /// the number of queues that received a copy.
    pub fn publish_raw(&self, routing_key: &str, payload: &[u8]) -> usize {
        let targets: Vec<Arc<Queue>> = {
            let topology = self.topology();
            let mut names: Vec<&String> = topology
                .bindings
                .iter()
                .filter(|(_, pattern)| topic_matches(pattern, routing_key))
                .map(|(queue, _)| queue)
                .collect();
            names.sort();
            names.dedup();
            names
                .into_iter()
                .filter_map(|name| topology.queues.get(name).cloned())
                .collect()
        };

        for queue in &targets {
            queue.push_back(Message {
                payload: payload.to_vec(),
                redelivered: false,
            });
        }
        debug!(routing_key, queues = targets.len(), "routed message");
        targets.len()
    }

    /// A publisher that sends under `routing_key`.
    #[must_use]
    pub fn publisher(&self, routing_key: &str) -> InMemoryPublisher {
        InMemoryPublisher {
            broker: self.clone(),
            routing_key: routing_key.to_owned(),
        }
    }

    /// Starts consuming `queue`, declaring it if needed.
    #[must_use]
    pub fn subscribe(&self, queue: &str) -> InMemorySubscription {
        InMemorySubscription {
            queue: self.queue(queue),
        }
    }

    /// Messages in `queue` waiting to be delivered.
    #[must_use]
    pub fn ready_count(&self, queue: &str) -> usize {
        self.queue(queue).ready().len()
    }

    /// Payloads rejected from `queue` without requeue.
    #[must_use]
    pub fn dead_letters(&self, queue: &str) -> Vec<Vec<u8>> {
        self.queue(queue)
            .dead_letters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|m| m.payload.clone())
            .collect()
    }

    /// Closes every queue; pending and future `next()` calls return `None`.
    pub fn close(&self) {
        for queue in self.topology().queues.values() {
            queue.closed.store(true, Ordering::SeqCst);
            queue.notify.notify_waiters();
        }
    }
}

/// [`EventPublisher`] for an [`InMemoryBroker`].
#[derive(Debug, Clone)]
pub struct InMemoryPublisher {
    broker: InMemoryBroker,
    routing_key: String,
}

#[async_trait]
impl EventPublisher for InMemoryPublisher {
    async fn publish(&self, record: &EventRecord) -> Result<(), TransportError> {
        let payload = record
            .to_json()
            .map_err(|e| TransportError::Publish(e.to_string()))?;
        self.broker.publish_raw(&self.routing_key, &payload);
        Ok(())
    }
}

/// [`Subscription`] to one queue of an [`InMemoryBroker`].
#[derive(Debug)]
pub struct InMemorySubscription {
    queue: Arc<Queue>,
}

#[async_trait]
impl Subscription for InMemorySubscription {
    async fn next(&mut self) -> Option<Result<Box<dyn Delivery>, TransportError>> {
        loop {
            // Registered before checking so a concurrent push is not missed.
            let notified = self.queue.notify.notified();
            if self.queue.closed.load(Ordering::SeqCst) {
                return None;
            }
            let message = self.queue.ready().pop_front();
            if let Some(message) = message {
                return Some(Ok(Box::new(InMemoryDelivery {
                    queue: Arc::clone(&self.queue),
                    message: Some(message),
                })));
            }
            notified.await;
        }
    }
}

/// A message taken from an in-memory queue.
///
/// Dropped without being settled, it goes back to the head of its queue
/// marked as redelivered.
#[derive(Debug)]
pub struct InMemoryDelivery {
    queue: Arc<Queue>,
    message: Option<Message>,
}

#[async_trait]
impl Delivery for InMemoryDelivery {
    fn payload(&self) -> &[u8] {
        self.message
            .as_ref()
            .map(|m| m.payload.as_slice())
            .unwrap_or_default()
    }

    fn redelivered(&self) -> bool {
        self.message.as_ref().is_some_and(|m| m.redelivered)
    }

    async fn ack(mut self: Box<Self>) -> Result<(), TransportError> {
        self.message.take();
        Ok(())
    }

    async fn reject(mut self: Box<Self>, requeue: bool) -> Result<(), TransportError> {
        if let Some(message) = self.message.take() {
            if requeue {
                self.queue.requeue(message);
            } else {
                self.queue.dead_letter(message);
            }
        }
        Ok(())
    }
}

impl Drop for InMemoryDelivery {
    fn drop(&mut self) {
        if let Some(message) = self.message.take() {
            self.queue.requeue(message);
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use folio_core::event::EventType;

    use super::*;

    fn record() -> EventRecord {
        EventRecord {
            occurred_at: Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
            subject_type: "Book".to_owned(),
            event_type: EventType::Create,
            description: Some("New books were created with IDs: a".to_owned()),
        }
    }

    #[tokio::test]
    async fn test_each_bound_queue_receives_its_own_copy() {
        let broker = InMemoryBroker::new();
        broker.bind("log", "book.log");
        broker.bind("audit", "book.*");
        broker.bind("unrelated", "author.*");

        broker.publisher("book.log").publish(&record()).await.unwrap();

        assert_eq!(broker.ready_count("log"), 1);
        assert_eq!(broker.ready_count("audit"), 1);
        assert_eq!(broker.ready_count("unrelated"), 0);
    }

    #[tokio::test]
    async fn test_overlapping_bindings_deliver_once_per_queue() {
        let broker = InMemoryBroker::new();
        broker.bind("log", "book.log");
        broker.bind("log", "book.#");

        let copies = broker.publish_raw("book.log", b"{}");

        assert_eq!(copies, 1);
        assert_eq!(broker.ready_count("log"), 1);
    }

    #[tokio::test]
    async fn test_acked_message_is_not_redelivered() {
        let broker = InMemoryBroker::new();
        broker.bind("log", "book.log");
        broker.publish_raw("book.log", b"payload");
        let mut subscription = broker.subscribe("log");

        let delivery = subscription.next().await.unwrap().unwrap();
        assert_eq!(delivery.payload(), b"payload");
        assert!(!delivery.redelivered());
        delivery.ack().await.unwrap();

        assert_eq!(broker.ready_count("log"), 0);
    }

    #[tokio::test]
    async fn test_dropped_delivery_is_redelivered() {
        let broker = InMemoryBroker::new();
        broker.bind("log", "book.log");
        broker.publish_raw("book.log", b"payload");
        let mut subscription = broker.subscribe("log");

        let first = subscription.next().await.unwrap().unwrap();
        drop(first);
        let second = subscription.next().await.unwrap().unwrap();

        assert_eq!(second.payload(), b"payload");
        assert!(second.redelivered());
    }

    #[tokio::test]
    async fn test_reject_without_requeue_dead_letters() {
        let broker = InMemoryBroker::new();
        broker.bind("log", "book.log");
        broker.publish_raw("book.log", b"bad");
        let mut subscription = broker.subscribe("log");

        let delivery = subscription.next().await.unwrap().unwrap();
        delivery.reject(false).await.unwrap();

        assert_eq!(broker.ready_count("log"), 0);
        assert_eq!(broker.dead_letters("log"), vec![b"bad".to_vec()]);
    }

    #[tokio::test]
    async fn test_next_waits_for_a_publish() {
        let broker = InMemoryBroker::new();
        broker.bind("log", "book.log");
        let mut subscription = broker.subscribe("log");

        let publisher = broker.clone();
        let handle = tokio::spawn(async move {
            tokio::task::yield_now().await;
            publisher.publish_raw("book.log", b"late");
        });
        let delivery = subscription.next().await.unwrap().unwrap();
        handle.await.unwrap();

        assert_eq!(delivery.payload(), b"late");
    }

    #[tokio::test]
    async fn test_close_ends_subscription() {
        let broker = InMemoryBroker::new();
        broker.bind("log", "book.log");
        let mut subscription = broker.subscribe("log");

        broker.close();

        assert!(subscription.next().await.is_none());
    }
}
