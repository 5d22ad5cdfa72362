//! Folio — book catalog bounded context.
//!
//! Executes create, update and delete commands against the book store and
//! emits one Event Record per mutation batch, strictly after the batch's
//! transaction has committed.

pub mod application;
pub mod domain;
