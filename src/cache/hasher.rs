//! Content hashing and payload decoding.
//!
//! Identity is the SHA-256 digest of the decoded bytes and nothing else:
//! file names, encodings and timestamps never feed the hash.

use std::borrow::Cow;
use std::fmt;
use std::io;
use std::path::Path;
use std::str::FromStr;

use base64::Engine as _;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use sha2::{Digest, Sha256};
use tokio::io::AsyncReadExt;

use crate::domain::entries::Identifier;

use super::error::{CacheError, CacheResult};

/// Read/hash granularity for streamed and chunked hashing.
pub const HASH_CHUNK_BYTES: usize = 64 * 1024;

const BASE64_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// How caller-supplied content is encoded before it becomes bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentEncoding {
    #[default]
    Binary,
    Base64,
    Hex,
    Utf8,
}

impl ContentEncoding {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Binary => "binary",
            Self::Base64 => "base64",
            Self::Hex => "hex",
            Self::Utf8 => "utf8",
        }
    }

    /// Turn the payload into the bytes that get hashed and stored.
    pub fn decode(self, content: &[u8]) -> CacheResult<Cow<'_, [u8]>> {
        match self {
            Self::Binary => Ok(Cow::Borrowed(content)),
            Self::Utf8 => std::str::from_utf8(content)
                .map(|_| Cow::Borrowed(content))
                .map_err(|err| CacheError::invalid_encoding(self.as_str(), err)),
            Self::Base64 => {
                let compact: Vec<u8> = content
                    .iter()
                    .copied()
                    .filter(|byte| !byte.is_ascii_whitespace())
                    .collect();
                BASE64_LENIENT
                    .decode(compact)
                    .map(Cow::Owned)
                    .map_err(|err| CacheError::invalid_encoding(self.as_str(), err))
            }
            Self::Hex => hex::decode(content.trim_ascii())
                .map(Cow::Owned)
                .map_err(|err| CacheError::invalid_encoding(self.as_str(), err)),
        }
    }
}

impl fmt::Display for ContentEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentEncoding {
    type Err = CacheError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "binary" => Ok(Self::Binary),
            "base64" => Ok(Self::Base64),
            "hex" => Ok(Self::Hex),
            "utf8" | "utf-8" | "text" => Ok(Self::Utf8),
            other => Err(CacheError::invalid_encoding(other, "unsupported encoding")),
        }
    }
}

/// Hash an in-memory buffer.
pub fn hash(bytes: &[u8]) -> Identifier {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    Identifier::from_digest(&hasher.finalize())
}

/// Decode `content` per `encoding` and hash the result.
pub async fn hash_encoded(
    content: &[u8],
    encoding: ContentEncoding,
) -> CacheResult<(Identifier, Cow<'_, [u8]>)> {
    let decoded = encoding.decode(content)?;
    let identifier = hash_chunked(&decoded).await;
    Ok((identifier, decoded))
}

/// Hash a buffer in chunks, yielding to the runtime between chunks so large
/// payloads do not monopolise a worker thread.
pub async fn hash_chunked(bytes: &[u8]) -> Identifier {
    if bytes.len() <= HASH_CHUNK_BYTES {
        return hash(bytes);
    }

    let mut hasher = Sha256::new();
    for chunk in bytes.chunks(HASH_CHUNK_BYTES) {
        hasher.update(chunk);
        tokio::task::yield_now().await;
    }
    Identifier::from_digest(&hasher.finalize())
}

/// Stream a file through the hasher, returning its identifier and size.
pub async fn hash_file(path: &Path) -> io::Result<(Identifier, u64)> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; HASH_CHUNK_BYTES];
    let mut total: u64 = 0;

    loop {
        let read = file.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
        total += read as u64;
    }

    Ok((Identifier::from_digest(&hasher.finalize()), total))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::error::CacheErrorKind;

    #[test]
    fn hash_is_deterministic_and_hex_encoded() {
        let first = hash(b"hello");
        let second = hash(b"hello");
        assert_eq!(first, second);
        assert_eq!(
            first.as_str(),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn distinct_content_yields_distinct_identifiers() {
        let samples: [&[u8]; 5] = [b"", b"a", b"b", b"hello", b"hello "];
        let ids: std::collections::HashSet<_> = samples.iter().map(|s| hash(s)).collect();
        assert_eq!(ids.len(), samples.len());
    }

    #[tokio::test]
    async fn identity_ignores_the_encoding_used_to_transport_content() {
        let (from_b64, _) = hash_encoded(b"aGVsbG8=", ContentEncoding::Base64)
            .await
            .expect("base64");
        let (from_hex, _) = hash_encoded(b"68656c6c6f", ContentEncoding::Hex)
            .await
            .expect("hex");
        let (from_text, decoded) = hash_encoded(b"hello", ContentEncoding::Utf8)
            .await
            .expect("utf8");
        assert_eq!(from_b64, hash(b"hello"));
        assert_eq!(from_hex, from_b64);
        assert_eq!(from_text, from_b64);
        assert_eq!(decoded.as_ref(), b"hello");
    }

    #[test]
    fn base64_tolerates_whitespace_and_missing_padding() {
        let decoded = ContentEncoding::Base64
            .decode(b"aGVs\nbG8")
            .expect("lenient base64");
        assert_eq!(decoded.as_ref(), b"hello");
    }

    #[tokio::test]
    async fn undecodable_content_is_an_encoding_error() {
        let err = hash_encoded(b"not base64!!", ContentEncoding::Base64)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), CacheErrorKind::InvalidEncoding);

        let err = ContentEncoding::Utf8.decode(&[0xff, 0xfe]).unwrap_err();
        assert_eq!(err.kind(), CacheErrorKind::InvalidEncoding);
    }

    #[test]
    fn encoding_names_parse_case_insensitively() {
        assert_eq!("BASE64".parse::<ContentEncoding>().unwrap(), ContentEncoding::Base64);
        assert_eq!("utf-8".parse::<ContentEncoding>().unwrap(), ContentEncoding::Utf8);
        let err = "rot13".parse::<ContentEncoding>().unwrap_err();
        assert_eq!(err.kind(), CacheErrorKind::InvalidEncoding);
    }

    #[tokio::test]
    async fn chunked_and_streamed_hashes_match_the_plain_hash() {
        let payload: Vec<u8> = (0..(HASH_CHUNK_BYTES * 3 + 17))
            .map(|i| (i % 251) as u8)
            .collect();
        let expected = hash(&payload);

        assert_eq!(hash_chunked(&payload).await, expected);

        let dir = tempfile::TempDir::new().expect("temp dir");
        let path = dir.path().join("payload.bin");
        std::fs::write(&path, &payload).expect("write payload");
        let (streamed, size) = hash_file(&path).await.expect("hash file");
        assert_eq!(streamed, expected);
        assert_eq!(size, payload.len() as u64);
    }
}
