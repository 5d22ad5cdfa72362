//! Application layer: command handlers, query handlers and the
//! commit-gated publisher.

pub mod command_handlers;
pub mod publisher;
pub mod query_handlers;
