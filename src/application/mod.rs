//! Application services: template storage and report rendering.

pub mod error;
pub mod render;
pub mod templates;
