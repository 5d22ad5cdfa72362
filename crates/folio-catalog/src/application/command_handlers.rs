//! Command handlers for the book catalog.
//!
//! Each handler validates its command, applies it inside one unit of work
//! and schedules at most one Event Record for the batch. The record is sent
//! only once the storage commit has succeeded.

use std::collections::HashMap;

use folio_core::book::{Book, BookPatch};
use folio_core::clock::Clock;
use folio_core::command::Command;
use folio_core::error::DomainError;
use folio_core::event::EventType;
use folio_core::repository::BookStore;
use folio_core::transaction::UnitOfWork;
use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::application::publisher::CommitGatedPublisher;
use crate::domain::commands::{CreateBooks, DeleteBook, UpdateBooks};

/// Message returned when every id in an update batch was found.
pub const ALL_UPDATED_MESSAGE: &str = "Books are successfully updated";

/// Result of a batch partial update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOutcome {
    /// Books as stored after the update, in request order.
    pub updated: Vec<Book>,
    /// Requested ids that do not exist.
    pub not_updated_ids: Vec<Uuid>,
    /// Human-readable summary.
    pub message: String,
}

impl UpdateOutcome {
    fn new(updated: Vec<Book>, not_updated_ids: Vec<Uuid>) -> Self {
        let message = if not_updated_ids.is_empty() {
            ALL_UPDATED_MESSAGE.to_owned()
        } else {
            let ids = not_updated_ids
                .iter()
                .map(Uuid::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            format!("Books with IDs [{ids}] are not updated")
        };
        Self {
            updated,
            not_updated_ids,
            message,
        }
    }
}

/// Handles `CreateBooks`: inserts every candidate in one transaction and
/// schedules a single CREATE event naming all new ids.
///
/// An empty batch is a no-op: no transaction is opened and nothing is sent.
///
/// # Errors
///
/// Returns `DomainError::Validation` if any candidate is invalid, in which
/// case nothing is inserted. Returns `DomainError::Infrastructure` if the
/// store fails; the transaction is then discarded and nothing is sent.
#[instrument(skip_all, fields(correlation_id = %command.correlation_id, count = command.books.len()))]
pub async fn handle_create_books(
    command: &CreateBooks,
    clock: &dyn Clock,
    store: &dyn BookStore,
    publisher: &CommitGatedPublisher,
) -> Result<Vec<Book>, DomainError> {
    for book in &command.books {
        book.validate()?;
    }
    if command.books.is_empty() {
        return Ok(Vec::new());
    }

    let now = clock.now();
    let mut uow = UnitOfWork::new(store.begin().await?);
    let mut created = Vec::with_capacity(command.books.len());
    for book in &command.books {
        created.push(uow.tx().insert(book, now).await?);
    }

    let ids = created.iter().map(|b| b.id).collect();
    publisher.schedule(&mut uow, EventType::Create, ids);
    uow.commit().await?;

    info!(
        command_type = command.command_type(),
        created = created.len(),
        "handled command"
    );
    Ok(created)
}

/// Collapses duplicate ids so the last patch for an id wins, keeping the
/// position of its first occurrence.
fn dedupe_patches(patches: &[BookPatch]) -> Vec<&BookPatch> {
    let mut position: HashMap<Uuid, usize> = HashMap::new();
    let mut unique: Vec<&BookPatch> = Vec::new();
    for patch in patches {
        if let Some(&i) = position.get(&patch.id) {
            unique[i] = patch;
        } else {
            position.insert(patch.id, unique.len());
            unique.push(patch);
        }
    }
    unique
}

/// Handles `UpdateBooks`: applies each patch to the book it names, reporting
/// unknown ids separately instead of failing.
///
/// A single UPDATE event naming the updated ids is scheduled when at least
/// one book was updated. Nothing is sent when none were.
///
/// # Errors
///
/// Returns `DomainError::Validation` if any patch is invalid. Returns
/// `DomainError::Infrastructure` if the store fails.
#[instrument(skip_all, fields(correlation_id = %command.correlation_id, count = command.patches.len()))]
pub async fn handle_update_books(
    command: &UpdateBooks,
    clock: &dyn Clock,
    store: &dyn BookStore,
    publisher: &CommitGatedPublisher,
) -> Result<UpdateOutcome, DomainError> {
    for patch in &command.patches {
        patch.validate()?;
    }
    let patches = dedupe_patches(&command.patches);
    if patches.is_empty() {
        return Ok(UpdateOutcome::new(Vec::new(), Vec::new()));
    }

    let ids: Vec<Uuid> = patches.iter().map(|p| p.id).collect();
    let mut uow = UnitOfWork::new(store.begin().await?);
    let mut existing: HashMap<Uuid, Book> = uow
        .tx()
        .find_many_for_update(&ids)
        .await?
        .into_iter()
        .map(|b| (b.id, b))
        .collect();

    let now = clock.now();
    let mut updated = Vec::new();
    let mut not_updated_ids = Vec::new();
    for patch in patches {
        match existing.remove(&patch.id) {
            Some(mut book) => {
                book.apply(patch, now);
                uow.tx().save(&book).await?;
                updated.push(book);
            }
            None => not_updated_ids.push(patch.id),
        }
    }

    if updated.is_empty() {
        uow.rollback().await?;
    } else {
        let updated_ids = updated.iter().map(|b| b.id).collect();
        publisher.schedule(&mut uow, EventType::Update, updated_ids);
        uow.commit().await?;
    }

    info!(
        command_type = command.command_type(),
        updated = updated.len(),
        not_updated = not_updated_ids.len(),
        "handled command"
    );
    Ok(UpdateOutcome::new(updated, not_updated_ids))
}

/// Handles `DeleteBook`: removes the book and schedules a DELETE event.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the book does not exist; nothing is
/// deleted or sent. Returns `DomainError::Infrastructure` if the store fails.
#[instrument(skip_all, fields(correlation_id = %command.correlation_id, book_id = %command.book_id))]
pub async fn handle_delete_book(
    command: &DeleteBook,
    store: &dyn BookStore,
    publisher: &CommitGatedPublisher,
) -> Result<(), DomainError> {
    let mut uow = UnitOfWork::new(store.begin().await?);
    if uow.tx().find_for_update(command.book_id).await?.is_none() {
        uow.rollback().await?;
        return Err(DomainError::NotFound(command.book_id));
    }
    uow.tx().delete(command.book_id).await?;

    publisher.schedule(&mut uow, EventType::Delete, vec![command.book_id]);
    uow.commit().await?;

    info!(command_type = command.command_type(), "handled command");
    Ok(())
}
