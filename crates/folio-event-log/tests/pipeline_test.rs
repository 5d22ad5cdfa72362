//! End-to-end: catalog mutation → topic broker → event log.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use folio_catalog::application::command_handlers::{handle_create_books, handle_delete_book};
use folio_catalog::application::publisher::CommitGatedPublisher;
use folio_catalog::domain::commands::{CreateBooks, DeleteBook};
use folio_core::book::NewBook;
use folio_core::error::DomainError;
use folio_event_log::application::consumer::{RetryPolicy, run_consumer};
use folio_event_log::application::ingestion::EventIngestor;
use folio_event_log::application::query_handlers::list_all_events;
use folio_test_support::{FixedClock, InMemoryBookStore, InMemoryLogStore};
use folio_transport::memory::InMemoryBroker;
use uuid::Uuid;

const QUEUE: &str = "book.events.log";
const ROUTING_KEY: &str = "book.log";

fn titled(title: &str) -> NewBook {
    NewBook {
        title: title.to_owned(),
        author: None,
        publication_year: None,
        description: None,
    }
}

#[tokio::test]
async fn test_created_batch_lands_as_one_log_entry_naming_every_id() {
    // Arrange
    let broker = InMemoryBroker::new();
    broker.bind(QUEUE, ROUTING_KEY);
    let clock = FixedClock(Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap());
    let books = InMemoryBookStore::new();
    let publisher = CommitGatedPublisher::new(
        Arc::new(broker.publisher(ROUTING_KEY)),
        Arc::new(clock),
    );
    let log = Arc::new(InMemoryLogStore::new());
    let ingestor = EventIngestor::new(log.clone());
    let subscription = broker.subscribe(QUEUE);
    let consumer = tokio::spawn(async move {
        run_consumer(subscription, &ingestor, RetryPolicy::default()).await
    });
    let command = CreateBooks {
        correlation_id: Uuid::new_v4(),
        books: vec![titled("A"), titled("B")],
    };

    // Act
    let created = handle_create_books(&command, &clock, &books, &publisher)
        .await
        .unwrap();
    tokio::time::timeout(Duration::from_secs(5), async {
        while log.entries().is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    broker.close();
    consumer.await.unwrap();

    // Assert
    assert_eq!(created.len(), 2);
    let events = list_all_events(log.as_ref()).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, "CREATE");
    assert_eq!(events[0].subject_type, "Book");
    let description = events[0].description.as_deref().unwrap();
    assert!(description.contains(&created[0].id.to_string()));
    assert!(description.contains(&created[1].id.to_string()));
}

#[tokio::test]
async fn test_deleting_unknown_book_sends_nothing_and_logs_nothing() {
    let broker = InMemoryBroker::new();
    broker.bind(QUEUE, ROUTING_KEY);
    let clock = FixedClock(Utc::now());
    let publisher = CommitGatedPublisher::new(
        Arc::new(broker.publisher(ROUTING_KEY)),
        Arc::new(clock),
    );
    let books = InMemoryBookStore::new();
    let missing = Uuid::new_v4();

    let result = handle_delete_book(
        &DeleteBook {
            correlation_id: Uuid::new_v4(),
            book_id: missing,
        },
        &books,
        &publisher,
    )
    .await;

    assert!(matches!(result, Err(DomainError::NotFound(id)) if id == missing));
    assert_eq!(broker.ready_count(QUEUE), 0);
}
