//! Shared test fakes and utilities for Folio.

mod book_store;
mod clock;
mod log_store;
mod publisher;

pub use book_store::{FailPoint, InMemoryBookStore};
pub use clock::{FixedClock, SteppingClock};
pub use log_store::{FailingLogStore, InMemoryLogStore};
pub use publisher::{FailingPublisher, PendingPublisher, RecordingPublisher};
