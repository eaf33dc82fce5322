//! Cache entry identity and metadata.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Length of a hex-encoded SHA-256 digest.
pub const IDENTIFIER_LEN: usize = 64;

/// Content-derived identifier: a lowercase hex SHA-256 digest.
///
/// Only values produced by the hasher or accepted by [`Identifier::parse`]
/// exist, so an identifier can always be used as a path component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier(String);

impl Identifier {
    /// Accept a caller-supplied identifier. Uppercase hex is normalised.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.len() != IDENTIFIER_LEN || !value.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        Some(Self(value.to_ascii_lowercase()))
    }

    pub(crate) fn from_digest(digest: &[u8]) -> Self {
        Self(hex::encode(digest))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Two-character shard directory the entry lives under.
    pub fn shard(&self) -> &str {
        &self.0[..2]
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Identifier {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Identifier::parse(&value).ok_or_else(|| format!("`{value}` is not a content identifier"))
    }
}

impl From<Identifier> for String {
    fn from(value: Identifier) -> Self {
        value.0
    }
}

/// A persisted cache object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub identifier: Identifier,
    pub display_name: String,
    pub extension: Option<String>,
    pub storage_path: PathBuf,
    pub size: u64,
    pub created_at: OffsetDateTime,
}

impl CacheEntry {
    /// Guessed media type for the entry, from its display name.
    pub fn content_type(&self) -> String {
        content_type_for(&self.display_name)
    }

    /// Display name without its extension.
    pub fn stem(&self) -> &str {
        file_stem(&self.display_name)
    }
}

/// Reduce a caller-supplied file name to its final path component.
///
/// Returns `None` when nothing usable remains.
pub fn normalize_display_name(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let name = Path::new(trimmed)
        .file_name()
        .and_then(|value| value.to_str())?
        .trim();
    if name.is_empty() || name == "." || name == ".." {
        return None;
    }
    Some(name.to_string())
}

/// Lowercased extension of a file name, without the leading dot.
pub fn extension_of(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.trim_matches('.').to_ascii_lowercase())
        .filter(|value| !value.is_empty())
}

/// File name without its final extension.
pub fn file_stem(name: &str) -> &str {
    Path::new(name)
        .file_stem()
        .and_then(|value| value.to_str())
        .unwrap_or(name)
}

/// Media type guessed from a file name, defaulting to octet-stream.
pub fn content_type_for(name: &str) -> String {
    mime_guess::from_path(name)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}
