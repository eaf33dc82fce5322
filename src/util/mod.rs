//! Small parsing helpers shared across layers.

pub mod bytes;
pub mod flags;
