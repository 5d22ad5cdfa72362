//! Route modules, one per service surface.

pub mod books;
pub mod events;
pub mod health;
