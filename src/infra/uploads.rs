//! Streaming multipart uploads into the cache's staging directory.

use std::error::Error as StdError;
use std::path::PathBuf;

use bytes::Bytes;
use futures::{Stream, StreamExt, pin_mut};
use tempfile::TempPath;
use thiserror::Error;
use tokio::{fs, io::AsyncWriteExt};

#[derive(Debug, Error)]
pub enum UploadStagingError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("uploaded file exceeds the {limit_bytes} byte limit")]
    PayloadTooLarge { limit_bytes: u64 },
    #[error("uploaded file stream failed")]
    PayloadStream {
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
    #[error("uploaded file is empty")]
    EmptyPayload,
}

/// An upload fully written to disk, removed on drop unless adopted.
#[derive(Debug)]
pub struct StagedUpload {
    pub path: TempPath,
    pub size_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct UploadStaging {
    dir: PathBuf,
    max_bytes: u64,
}

impl UploadStaging {
    /// `dir` must be on the same filesystem as the cache so adoption is a rename.
    pub fn new(dir: PathBuf, max_bytes: u64) -> Self {
        Self { dir, max_bytes }
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Stream `stream` into a fresh staging file.
    ///
    /// Nothing is left behind on failure: the temp file is removed when the
    /// returned error drops it.
    pub async fn stage_stream<S>(&self, stream: S) -> Result<StagedUpload, UploadStagingError>
    where
        S: Stream<Item = Result<Bytes, UploadStagingError>>,
    {
        let (file, path) = tempfile::Builder::new()
            .prefix("upload-")
            .tempfile_in(&self.dir)?
            .into_parts();
        let mut file = fs::File::from_std(file);
        let mut size_bytes: u64 = 0;

        pin_mut!(stream);
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if chunk.is_empty() {
                continue;
            }
            size_bytes = size_bytes.saturating_add(chunk.len() as u64);
            if size_bytes > self.max_bytes {
                return Err(UploadStagingError::PayloadTooLarge {
                    limit_bytes: self.max_bytes,
                });
            }
            file.write_all(&chunk).await?;
        }

        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        if size_bytes == 0 {
            return Err(UploadStagingError::EmptyPayload);
        }

        Ok(StagedUpload { path, size_bytes })
    }
}
