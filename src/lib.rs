//! Content-addressed template cache behind an HTTP render service.
//!
//! Templates and rendered reports are stored once per distinct content,
//! addressed by the SHA-256 of their bytes ([`cache::FileCache`]). The HTTP
//! layer ([`infra::http`]) adopts uploads into the cache and hands cached
//! templates to an external rendering engine ([`application::render`]).

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
pub mod util;
