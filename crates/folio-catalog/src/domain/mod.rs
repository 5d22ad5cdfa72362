//! Domain layer: commands and the Event Records they produce.

pub mod commands;
pub mod events;
