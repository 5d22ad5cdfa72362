//! Folio — event log bounded context.
//!
//! Consumes Event Records from a subscription, materializes each one as an
//! append-only Log Entry and serves range queries over the log.

pub mod application;
