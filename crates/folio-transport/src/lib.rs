//! Folio Transport — Transport Channel implementations.
//!
//! [`amqp`] talks to a RabbitMQ-compatible broker through a durable topic
//! exchange. [`memory`] is an in-process broker with the same routing and
//! acknowledgement semantics, used for local runs and tests.

pub mod amqp;
pub mod memory;
pub mod topic;
