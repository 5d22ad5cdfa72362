//! Transport Channel abstractions.
//!
//! Publishers send Event Records to a topic; subscriptions receive a copy of
//! every matching message and must acknowledge it. Delivery is at-least-once:
//! an unacknowledged message is delivered again.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::event::EventRecord;

/// Failures talking to the message broker.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Could not connect to or set up the broker topology.
    #[error("transport connection error: {0}")]
    Connection(String),

    /// The broker refused or failed to accept a publish.
    #[error("publish failed: {0}")]
    Publish(String),

    /// The broker negatively acknowledged a published message.
    #[error("broker did not confirm the published message")]
    NotConfirmed,

    /// The operation did not complete in time.
    #[error("transport operation timed out after {0:?}")]
    Timeout(Duration),

    /// The channel or subscription is closed.
    #[error("transport channel closed")]
    Closed,

    /// Acknowledging or rejecting a delivery failed.
    #[error("acknowledgement failed: {0}")]
    Acknowledge(String),
}

/// Sends Event Records onto the channel.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publishes one record under the publisher's routing key.
    async fn publish(&self, record: &EventRecord) -> Result<(), TransportError>;
}

/// One received message awaiting acknowledgement.
///
/// Dropping a delivery without calling [`Delivery::ack`] or
/// [`Delivery::reject`] leaves it unacknowledged; the broker redelivers it.
#[async_trait]
pub trait Delivery: Send + Sync {
    /// Raw message body.
    fn payload(&self) -> &[u8];

    /// Whether the broker has delivered this message before.
    fn redelivered(&self) -> bool;

    /// Marks the message processed; it will not be delivered again.
    async fn ack(self: Box<Self>) -> Result<(), TransportError>;

    /// Marks the message failed. With `requeue` it is delivered again;
    /// without, it is dead-lettered or discarded per broker policy.
    async fn reject(self: Box<Self>, requeue: bool) -> Result<(), TransportError>;
}

/// A bound, durable queue being consumed.
#[async_trait]
pub trait Subscription: Send {
    /// Waits for the next delivery. `None` once the subscription is closed.
    async fn next(&mut self) -> Option<Result<Box<dyn Delivery>, TransportError>>;
}
