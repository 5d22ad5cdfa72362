//! Application layer for the event log.

pub mod consumer;
pub mod ingestion;
pub mod query_handlers;
