//! Folio event log service entry point.
//!
//! Serves the log query API and runs the ingestion consumer on the same
//! runtime. If the consumer stops on its own the HTTP server is shut down and
//! the process exits with an error.

use std::sync::Arc;
use std::time::Duration;

use folio_api::WatchedTask;
use folio_api::config::{self, EventLogConfig};
use folio_api::error::AppError;
use folio_api::state::EventLogState;
use folio_api::telemetry;
use folio_event_log::application::consumer::run_consumer;
use folio_event_log::application::ingestion::EventIngestor;
use folio_store::EVENT_LOG_MIGRATOR;
use folio_store::pg_log_store::PgLogStore;
use folio_transport::amqp::AmqpConnection;
use sqlx::postgres::PgPoolOptions;
use tracing::{error, info, warn};

/// How long shutdown waits for the consumer to settle its last delivery.
const CONSUMER_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<(), AppError> {
    config::load_dotenv();
    let telemetry = telemetry::init_tracing("event-log-service")?;

    let result = run().await;
    if let Err(e) = &result {
        error!(error = %e, "event log service failed");
    }

    telemetry.shutdown();
    result
}

async fn run() -> Result<(), AppError> {
    let config = EventLogConfig::from_env()?;
    info!("Starting Folio event log service");

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await?;
    EVENT_LOG_MIGRATOR.run(&pool).await?;
    let log_store = Arc::new(PgLogStore::new(pool));

    let amqp = AmqpConnection::connect(&config.amqp.url).await?;
    let subscription = amqp
        .subscribe(&config.amqp.topology(), config.amqp.prefetch, "event-log-service")
        .await?;
    let ingestor = EventIngestor::new(log_store.clone());
    let retry = config.retry;
    let consumer =
        WatchedTask::spawn(async move { run_consumer(subscription, &ingestor, retry).await });

    let app = folio_api::event_log_app(EventLogState::new(log_store));
    let addr = config.http.socket_addr()?;
    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(folio_api::shutdown_signal_or(consumer.stopped()))
        .await?;

    let consumer_failed = consumer.has_stopped();
    if let Err(e) = amqp.close().await {
        warn!(error = %e, "failed to close AMQP connection");
    }
    match tokio::time::timeout(CONSUMER_DRAIN_TIMEOUT, consumer.into_handle()).await {
        Ok(Ok(summary)) => info!(acked = summary.acked, "event log service stopped"),
        Ok(Err(e)) => error!(error = %e, "consumer task panicked"),
        Err(_) => warn!("consumer did not stop in time"),
    }

    if consumer_failed {
        return Err(AppError::ConsumerStopped);
    }
    Ok(())
}
