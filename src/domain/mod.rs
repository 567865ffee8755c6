//! Domain layer types and invariants.

pub mod codec;
pub mod command;
pub mod entities;
