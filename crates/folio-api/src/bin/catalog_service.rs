//! Folio catalog service entry point.

use std::sync::Arc;

use folio_api::config::{self, CatalogConfig};
use folio_api::error::AppError;
use folio_api::state::CatalogState;
use folio_api::telemetry;
use folio_catalog::application::publisher::CommitGatedPublisher;
use folio_core::clock::{Clock, SystemClock};
use folio_store::CATALOG_MIGRATOR;
use folio_store::pg_book_store::PgBookStore;
use folio_transport::amqp::AmqpConnection;
use sqlx::postgres::PgPoolOptions;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    config::load_dotenv();
    let telemetry = telemetry::init_tracing("catalog-service")?;

    let result = run().await;
    if let Err(e) = &result {
        error!(error = %e, "catalog service failed");
    }

    telemetry.shutdown();
    result
}

async fn run() -> Result<(), AppError> {
    let config = CatalogConfig::from_env()?;
    info!("Starting Folio catalog service");

    // Create database connection pool.
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await?;
    CATALOG_MIGRATOR.run(&pool).await?;

    // Connect the event publisher.
    let amqp = AmqpConnection::connect(&config.amqp.url).await?;
    let transport = amqp
        .publisher(&config.amqp.exchange, &config.amqp.routing_key)
        .await?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let publisher = CommitGatedPublisher::new(Arc::new(transport), Arc::clone(&clock))
        .with_timeout(config.publish_timeout);
    let state = CatalogState::new(clock, Arc::new(PgBookStore::new(pool)), publisher);
    let app = folio_api::catalog_app(state);

    let addr = config.http.socket_addr()?;
    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(folio_api::shutdown_signal())
        .await?;

    amqp.close().await?;
    info!("catalog service stopped");
    Ok(())
}
