//! Content-addressed file cache.
//!
//! - **Hasher**: SHA-256 identity of decoded content ([`hasher`])
//! - **Store**: on-disk entries plus an in-memory index ([`FileCache`])
//!
//! Writes of identical content are de-duplicated: whichever caller takes the
//! per-identifier lock first persists the bytes, everyone else gets the same
//! entry back.

mod error;
pub mod hasher;
mod lock;
mod store;

pub use error::{CacheError, CacheErrorKind, CacheResult};
pub use hasher::{ContentEncoding, hash, hash_chunked, hash_encoded, hash_file};
pub use store::{CacheStats, FileCache, ORPHANED_STORAGE_WARNING, Removal, WriteOptions};

pub(crate) use store::{
    METRIC_MOVE_TOTAL, METRIC_READ_TOTAL, METRIC_REMOVE_TOTAL, METRIC_WRITE_TOTAL,
};
