//! Folio Core — shared domain abstractions.
//!
//! This crate defines the fundamental traits and types that the catalog and
//! event-log services depend on. It contains no infrastructure code.

pub mod book;
pub mod clock;
pub mod command;
pub mod error;
pub mod event;
pub mod log;
pub mod repository;
pub mod transaction;
pub mod transport;
