use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failure classes reported by the cache store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheErrorKind {
    InvalidInput,
    InvalidEncoding,
    NotFound,
    SourceNotFound,
    StorageFailure,
}

impl CacheErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidInput => "invalid_input",
            Self::InvalidEncoding => "invalid_encoding",
            Self::NotFound => "not_found",
            Self::SourceNotFound => "source_not_found",
            Self::StorageFailure => "storage_failure",
        }
    }
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("content could not be decoded as {encoding}: {detail}")]
    InvalidEncoding { encoding: String, detail: String },
    #[error("no cache entry for identifier `{0}`")]
    NotFound(String),
    #[error("source file `{}` not found", .0.display())]
    SourceNotFound(PathBuf),
    #[error("storage failure during {op}")]
    StorageFailure {
        op: &'static str,
        #[source]
        source: io::Error,
    },
}

impl CacheError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn invalid_encoding(encoding: impl Into<String>, detail: impl ToString) -> Self {
        Self::InvalidEncoding {
            encoding: encoding.into(),
            detail: detail.to_string(),
        }
    }

    pub fn not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound(identifier.into())
    }

    pub fn storage(op: &'static str, source: io::Error) -> Self {
        Self::StorageFailure { op, source }
    }

    pub fn kind(&self) -> CacheErrorKind {
        match self {
            Self::InvalidInput(_) => CacheErrorKind::InvalidInput,
            Self::InvalidEncoding { .. } => CacheErrorKind::InvalidEncoding,
            Self::NotFound(_) => CacheErrorKind::NotFound,
            Self::SourceNotFound(_) => CacheErrorKind::SourceNotFound,
            Self::StorageFailure { .. } => CacheErrorKind::StorageFailure,
        }
    }
}

pub type CacheResult<T> = Result<T, CacheError>;
