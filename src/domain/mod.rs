//! Domain layer types and invariants.

pub mod entries;
pub mod file_types;
