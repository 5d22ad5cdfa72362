//! AMQP 0-9-1 transport over a durable topic exchange.

use async_trait::async_trait;
use folio_core::event::EventRecord;
use folio_core::transport::{Delivery, EventPublisher, Subscription, TransportError};
use futures_lite::StreamExt;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions, BasicQosOptions,
    ConfirmSelectOptions, ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
};
use lapin::publisher_confirm::Confirmation;
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, Consumer, ExchangeKind};
use tracing::{debug, info};

/// AMQP `delivery_mode` for messages the broker writes to disk.
const PERSISTENT_DELIVERY_MODE: u8 = 2;

/// Exchange, queue and binding shared by producer and consumer.
#[derive(Debug, Clone)]
pub struct AmqpTopology {
    /// Topic exchange name.
    pub exchange: String,
    /// Durable queue consumed by the event log.
    pub queue: String,
    /// Routing key used to publish and to bind the queue.
    pub routing_key: String,
}

fn connection_error(e: lapin::Error) -> TransportError {
    TransportError::Connection(e.to_string())
}

fn publish_error(e: lapin::Error) -> TransportError {
    TransportError::Publish(e.to_string())
}

fn ack_error(e: lapin::Error) -> TransportError {
    TransportError::Acknowledge(e.to_string())
}

async fn declare_exchange(channel: &Channel, exchange: &str) -> Result<(), TransportError> {
    channel
        .exchange_declare(
            exchange,
            ExchangeKind::Topic,
            ExchangeDeclareOptions {
                durable: true,
                ..ExchangeDeclareOptions::default()
            },
            FieldTable::default(),
        )
        .await
        .map_err(connection_error)
}

/// A connection to an AMQP broker.
pub struct AmqpConnection {
    connection: Connection,
}

impl AmqpConnection {
    /// Connects to the broker at `uri`.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Connection` if the broker is unreachable or
    /// refuses the credentials.
    pub async fn connect(uri: &str) -> Result<Self, TransportError> {
        let connection = Connection::connect(uri, ConnectionProperties::default())
            .await
            .map_err(connection_error)?;
        info!("connected to AMQP broker");
        Ok(Self { connection })
    }

    /// Opens a confirm-mode channel publishing to `exchange` under
    /// `routing_key`, declaring the exchange if needed.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Connection` if the channel or exchange cannot
    /// be set up.
    pub async fn publisher(
        &self,
        exchange: &str,
        routing_key: &str,
    ) -> Result<AmqpPublisher, TransportError> {
        let channel = self
            .connection
            .create_channel()
            .await
            .map_err(connection_error)?;
        declare_exchange(&channel, exchange).await?;
        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await
            .map_err(connection_error)?;

        Ok(AmqpPublisher {
            channel,
            exchange: exchange.to_owned(),
            routing_key: routing_key.to_owned(),
        })
    }

    /// Declares the topology and starts consuming its queue with at most
    /// `prefetch` unacknowledged deliveries in flight.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Connection` if any declaration or the
    /// consume request fails.
    pub async fn subscribe(
        &self,
        topology: &AmqpTopology,
        prefetch: u16,
        consumer_tag: &str,
    ) -> Result<AmqpSubscription, TransportError> {
        let channel = self
            .connection
            .create_channel()
            .await
            .map_err(connection_error)?;
        declare_exchange(&channel, &topology.exchange).await?;
        channel
            .queue_declare(
                &topology.queue,
                QueueDeclareOptions {
                    durable: true,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(connection_error)?;
        channel
            .queue_bind(
                &topology.queue,
                &topology.exchange,
                &topology.routing_key,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(connection_error)?;
        channel
            .basic_qos(prefetch, BasicQosOptions::default())
            .await
            .map_err(connection_error)?;

        let consumer = channel
            .basic_consume(
                &topology.queue,
                consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(connection_error)?;
        info!(
            queue = %topology.queue,
            exchange = %topology.exchange,
            routing_key = %topology.routing_key,
            "consuming queue"
        );

        Ok(AmqpSubscription { consumer })
    }

    /// Closes the connection.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Connection` if the close handshake fails.
    pub async fn close(&self) -> Result<(), TransportError> {
        self.connection
            .close(200, "shutting down")
            .await
            .map_err(connection_error)
    }
}

/// [`EventPublisher`] over an AMQP confirm-mode channel.
pub struct AmqpPublisher {
    channel: Channel,
    exchange: String,
    routing_key: String,
}

#[async_trait]
impl EventPublisher for AmqpPublisher {
    async fn publish(&self, record: &EventRecord) -> Result<(), TransportError> {
        let payload = record
            .to_json()
            .map_err(|e| TransportError::Publish(e.to_string()))?;
        let properties = BasicProperties::default()
            .with_content_type(EventRecord::CONTENT_TYPE.into())
            .with_delivery_mode(PERSISTENT_DELIVERY_MODE);

        let confirm = self
            .channel
            .basic_publish(
                &self.exchange,
                &self.routing_key,
                BasicPublishOptions::default(),
                &payload,
                properties,
            )
            .await
            .map_err(publish_error)?;

        match confirm.await.map_err(publish_error)? {
            Confirmation::Ack(_) | Confirmation::NotRequested => {
                debug!(exchange = %self.exchange, routing_key = %self.routing_key, "publish confirmed");
                Ok(())
            }
            Confirmation::Nack(_) => Err(TransportError::NotConfirmed),
        }
    }
}

/// [`Subscription`] backed by an AMQP consumer.
pub struct AmqpSubscription {
    consumer: Consumer,
}

#[async_trait]
impl Subscription for AmqpSubscription {
    async fn next(&mut self) -> Option<Result<Box<dyn Delivery>, TransportError>> {
        let delivery = self.consumer.next().await?;
        Some(
            delivery
                .map(|d| Box::new(AmqpDelivery { delivery: d }) as Box<dyn Delivery>)
                .map_err(connection_error),
        )
    }
}

/// A message received from an AMQP queue.
pub struct AmqpDelivery {
    delivery: lapin::message::Delivery,
}

#[async_trait]
impl Delivery for AmqpDelivery {
    fn payload(&self) -> &[u8] {
        &self.delivery.data
    }

    fn redelivered(&self) -> bool {
        self.delivery.redelivered
    }

    async fn ack(self: Box<Self>) -> Result<(), TransportError> {
        self.delivery
            .acker
            .ack(BasicAckOptions::default())
            .await
            .map_err(ack_error)
    }

    async fn reject(self: Box<Self>, requeue: bool) -> Result<(), TransportError> {
        self.delivery
            .acker
            .nack(BasicNackOptions {
                requeue,
                ..BasicNackOptions::default()
            })
            .await
            .map_err(ack_error)
    }
}
