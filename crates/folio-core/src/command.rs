//! Command abstractions.

use uuid::Uuid;

/// A mutation request handled by a command processor.
pub trait Command: Send + Sync + std::fmt::Debug {
    /// Dotted command name used in log fields, e.g. `catalog.create_books`.
    fn command_type(&self) -> &'static str;

    /// Correlation ID carried through logs for this command.
    fn correlation_id(&self) -> Uuid;
}
