//! Content-addressed file store.
//!
//! Layout under the configured root:
//!
//! ```text
//! <root>/.staging/             in-flight temp files, same filesystem as entries
//! <root>/<id[0..2]>/<id>       content
//! <root>/<id[0..2]>/<id>.json  metadata sidecar
//! ```
//!
//! Content and sidecars only become visible through an atomic rename out of
//! the staging directory, so a concurrent reader sees either nothing, the old
//! file or the complete new file. The in-memory index is rebuilt from the
//! sidecars on [`FileCache::open`].

use std::collections::HashMap;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::Instant;

use bytes::Bytes;
use metrics::counter;
use serde::{Deserialize, Serialize};
use tempfile::TempPath;
use time::OffsetDateTime;
use tokio::{fs, io::AsyncWriteExt};
use tracing::{error, info, warn};

use crate::domain::entries::{CacheEntry, Identifier, extension_of, normalize_display_name};

use super::error::{CacheError, CacheResult};
use super::hasher::{ContentEncoding, hash_encoded, hash_file};
use super::lock::{EntryLocks, rw_read, rw_write};

const SOURCE: &str = "cache::store";
const STAGING_DIR: &str = ".staging";
const SIDECAR_SUFFIX: &str = ".json";

pub(crate) const METRIC_WRITE_TOTAL: &str = "docstash_cache_write_total";
pub(crate) const METRIC_MOVE_TOTAL: &str = "docstash_cache_move_total";
pub(crate) const METRIC_READ_TOTAL: &str = "docstash_cache_read_total";
pub(crate) const METRIC_REMOVE_TOTAL: &str = "docstash_cache_remove_total";

/// Caller-facing text for [`Removal::storage_warning`]. Paths and OS errors
/// only go to the log.
pub const ORPHANED_STORAGE_WARNING: &str = "backing storage could not be deleted";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// Replace an existing entry instead of returning it untouched.
    pub overwrite: bool,
}

/// Result of a successful removal.
#[derive(Debug, Clone)]
pub struct Removal {
    pub entry: CacheEntry,
    /// [`ORPHANED_STORAGE_WARNING`] when metadata was purged but the backing
    /// files could not be deleted.
    pub storage_warning: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub total_bytes: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PersistOutcome {
    Stored,
    Deduplicated,
    Overwritten,
}

impl PersistOutcome {
    fn as_str(self) -> &'static str {
        match self {
            Self::Stored => "stored",
            Self::Deduplicated => "deduplicated",
            Self::Overwritten => "overwritten",
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Sidecar {
    identifier: Identifier,
    display_name: String,
    size: u64,
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
}

/// Filesystem-backed content-addressed cache.
#[derive(Debug)]
pub struct FileCache {
    root: PathBuf,
    staging: PathBuf,
    index: RwLock<HashMap<Identifier, CacheEntry>>,
    locks: EntryLocks,
}

impl FileCache {
    /// Open (or initialise) a cache rooted at `root`.
    ///
    /// Leftover staging files from interrupted writes are purged and the
    /// index is rebuilt from the sidecars found on disk.
    pub async fn open(root: impl Into<PathBuf>) -> CacheResult<Self> {
        let started_at = Instant::now();
        let root = root.into();
        let staging = root.join(STAGING_DIR);
        fs::create_dir_all(&staging)
            .await
            .map_err(|err| CacheError::storage("open.create_dir", err))?;

        let cache = Self {
            root,
            staging,
            index: RwLock::new(HashMap::new()),
            locks: EntryLocks::new(),
        };

        let purged = cache
            .purge_staging()
            .await
            .map_err(|err| CacheError::storage("open.purge_staging", err))?;
        let (entries, skipped) = cache
            .scan()
            .await
            .map_err(|err| CacheError::storage("open.scan", err))?;

        let stats = {
            let mut index = rw_write(&cache.index, SOURCE, "open");
            for entry in entries {
                index.insert(entry.identifier.clone(), entry);
            }
            stats_of(&index)
        };

        info!(
            target = SOURCE,
            op = "cache::open",
            root = %cache.root.display(),
            entries = stats.entries,
            total_bytes = stats.total_bytes,
            purged_staging = purged,
            skipped,
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            "Cache index rebuilt"
        );

        Ok(cache)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory for temp files that will later be renamed into the cache.
    pub fn staging_dir(&self) -> &Path {
        &self.staging
    }

    pub fn stats(&self) -> CacheStats {
        stats_of(&rw_read(&self.index, SOURCE, "stats"))
    }

    /// Decode, hash and persist `content` under its identifier.
    pub async fn write(
        &self,
        content: &[u8],
        display_name: &str,
        encoding: ContentEncoding,
        options: WriteOptions,
    ) -> CacheResult<CacheEntry> {
        let started_at = Instant::now();
        let result = self
            .write_inner(content, display_name, encoding, options)
            .await;

        match &result {
            Ok((entry, outcome)) => {
                counter!(METRIC_WRITE_TOTAL, "result" => outcome.as_str()).increment(1);
                info!(
                    target = SOURCE,
                    op = "cache::write",
                    result = outcome.as_str(),
                    identifier = %entry.identifier,
                    display_name = %entry.display_name,
                    size = entry.size,
                    elapsed_ms = started_at.elapsed().as_millis() as u64,
                    "Cache write completed"
                );
            }
            Err(err) => {
                counter!(METRIC_WRITE_TOTAL, "result" => "error").increment(1);
                warn!(
                    target = SOURCE,
                    op = "cache::write",
                    result = "error",
                    error_kind = err.kind().as_str(),
                    error = %err,
                    elapsed_ms = started_at.elapsed().as_millis() as u64,
                    "Cache write failed"
                );
            }
        }

        result.map(|(entry, _)| entry)
    }

    async fn write_inner(
        &self,
        content: &[u8],
        display_name: &str,
        encoding: ContentEncoding,
        options: WriteOptions,
    ) -> CacheResult<(CacheEntry, PersistOutcome)> {
        let display_name = normalize_display_name(display_name)
            .ok_or_else(|| CacheError::invalid_input("a display name is required"))?;
        let (identifier, decoded) = hash_encoded(content, encoding).await?;
        if decoded.is_empty() {
            return Err(CacheError::invalid_input("content is empty"));
        }

        self.persist_bytes(identifier, &decoded, display_name, options.overwrite)
            .await
    }

    /// Store `bytes` under `identifier`, holding the entry lock throughout.
    async fn persist_bytes(
        &self,
        identifier: Identifier,
        bytes: &[u8],
        display_name: String,
        overwrite: bool,
    ) -> CacheResult<(CacheEntry, PersistOutcome)> {
        let _guard = self.locks.acquire(&identifier).await;

        let existing = self.lookup(&identifier);
        if let Some(entry) = existing.as_ref() {
            if !overwrite {
                return Ok((entry.clone(), PersistOutcome::Deduplicated));
            }
        }

        self.ensure_shard(&identifier).await?;
        let content_path = self.content_path(&identifier);
        let staged = self.stage_bytes("write", bytes).await?;
        staged
            .persist(&content_path)
            .map_err(|err| CacheError::storage("write.rename", err.error))?;

        match self.commit(identifier, display_name, bytes.len() as u64).await {
            Ok(entry) if existing.is_some() => Ok((entry, PersistOutcome::Overwritten)),
            Ok(entry) => Ok((entry, PersistOutcome::Stored)),
            Err(err) => {
                if existing.is_none() {
                    let _ = fs::remove_file(&content_path).await;
                }
                Err(err)
            }
        }
    }

    /// Adopt a file that already sits on disk (e.g. a finished upload).
    ///
    /// The source is renamed into place, or deleted when identical content
    /// is already cached.
    pub async fn move_file(&self, source: &Path, display_name: &str) -> CacheResult<CacheEntry> {
        let started_at = Instant::now();
        let result = self.move_inner(source, display_name).await;

        match &result {
            Ok((entry, outcome)) => {
                counter!(METRIC_MOVE_TOTAL, "result" => outcome.as_str()).increment(1);
                info!(
                    target = SOURCE,
                    op = "cache::move",
                    result = outcome.as_str(),
                    identifier = %entry.identifier,
                    display_name = %entry.display_name,
                    size = entry.size,
                    source = %source.display(),
                    elapsed_ms = started_at.elapsed().as_millis() as u64,
                    "Cache move completed"
                );
            }
            Err(err) => {
                counter!(METRIC_MOVE_TOTAL, "result" => "error").increment(1);
                warn!(
                    target = SOURCE,
                    op = "cache::move",
                    result = "error",
                    error_kind = err.kind().as_str(),
                    error = %err,
                    source = %source.display(),
                    elapsed_ms = started_at.elapsed().as_millis() as u64,
                    "Cache move failed"
                );
            }
        }

        result.map(|(entry, _)| entry)
    }

    async fn move_inner(
        &self,
        source: &Path,
        display_name: &str,
    ) -> CacheResult<(CacheEntry, PersistOutcome)> {
        let (identifier, size) = match hash_file(source).await {
            Ok(hashed) => hashed,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(CacheError::SourceNotFound(source.to_path_buf()));
            }
            Err(err) => return Err(CacheError::storage("move.hash", err)),
        };

        let Some(display_name) = normalize_display_name(display_name) else {
            discard_source(source).await;
            return Err(CacheError::invalid_input("a display name is required"));
        };
        if size == 0 {
            discard_source(source).await;
            return Err(CacheError::invalid_input("uploaded file is empty"));
        }

        let _guard = self.locks.acquire(&identifier).await;

        if let Some(existing) = self.lookup(&identifier) {
            discard_source(source).await;
            return Ok((existing, PersistOutcome::Deduplicated));
        }

        self.ensure_shard(&identifier).await?;
        let content_path = self.content_path(&identifier);
        match fs::rename(source, &content_path).await {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(CacheError::SourceNotFound(source.to_path_buf()));
            }
            Err(err) if err.kind() == ErrorKind::CrossesDevices => {
                self.copy_into_place(source, &content_path).await?;
            }
            Err(err) => return Err(CacheError::storage("move.rename", err)),
        }

        match self.commit(identifier, display_name, size).await {
            Ok(entry) => Ok((entry, PersistOutcome::Stored)),
            Err(err) => {
                let _ = fs::remove_file(&content_path).await;
                Err(err)
            }
        }
    }

    /// Metadata lookup without touching the content file.
    pub fn find(&self, identifier: &str) -> CacheResult<CacheEntry> {
        Identifier::parse(identifier)
            .and_then(|id| self.lookup(&id))
            .ok_or_else(|| CacheError::not_found(identifier))
    }

    /// Load the full content of a registered entry.
    pub async fn read(&self, identifier: &str) -> CacheResult<Bytes> {
        let entry = match self.find(identifier) {
            Ok(entry) => entry,
            Err(err) => {
                counter!(METRIC_READ_TOTAL, "result" => "not_found").increment(1);
                return Err(err);
            }
        };

        match fs::read(&entry.storage_path).await {
            Ok(data) => {
                counter!(METRIC_READ_TOTAL, "result" => "hit").increment(1);
                Ok(Bytes::from(data))
            }
            Err(err) => {
                counter!(METRIC_READ_TOTAL, "result" => "storage_failure").increment(1);
                let result = if err.kind() == ErrorKind::NotFound {
                    "drift"
                } else {
                    "io_error"
                };
                error!(
                    target = SOURCE,
                    op = "cache::read",
                    result,
                    identifier = %entry.identifier,
                    path = %entry.storage_path.display(),
                    error = %err,
                    "Registered cache entry could not be read from storage"
                );
                Err(CacheError::storage("read", err))
            }
        }
    }

    /// Remove an entry's metadata and backing files.
    pub async fn remove(&self, identifier: &str) -> CacheResult<Removal> {
        let id = Identifier::parse(identifier).ok_or_else(|| CacheError::not_found(identifier))?;
        let _guard = self.locks.acquire(&id).await;

        let entry = rw_write(&self.index, SOURCE, "remove")
            .remove(&id)
            .ok_or_else(|| CacheError::not_found(identifier))?;

        let mut failures = Vec::new();
        for path in [self.sidecar_path(&id), self.content_path(&id)] {
            match fs::remove_file(&path).await {
                Ok(()) => {}
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => failures.push(format!("{}: {err}", path.display())),
            }
        }

        let storage_warning = if failures.is_empty() {
            counter!(METRIC_REMOVE_TOTAL, "result" => "removed").increment(1);
            info!(
                target = SOURCE,
                op = "cache::remove",
                result = "removed",
                identifier = %id,
                "Cache entry removed"
            );
            None
        } else {
            counter!(METRIC_REMOVE_TOTAL, "result" => "orphaned").increment(1);
            warn!(
                target = SOURCE,
                op = "cache::remove",
                result = "orphaned",
                identifier = %id,
                failures = %failures.join("; "),
                "Cache entry purged but its files could not be deleted"
            );
            Some(ORPHANED_STORAGE_WARNING.to_string())
        };

        Ok(Removal {
            entry,
            storage_warning,
        })
    }

    fn lookup(&self, identifier: &Identifier) -> Option<CacheEntry> {
        rw_read(&self.index, SOURCE, "lookup").get(identifier).cloned()
    }

    /// Write the sidecar and register the entry in the index.
    async fn commit(
        &self,
        identifier: Identifier,
        display_name: String,
        size: u64,
    ) -> CacheResult<CacheEntry> {
        let sidecar = Sidecar {
            identifier,
            display_name,
            size,
            created_at: OffsetDateTime::now_utc(),
        };
        let encoded = serde_json::to_vec_pretty(&sidecar)
            .map_err(|err| CacheError::storage("commit.encode", io::Error::other(err)))?;
        let staged = self.stage_bytes("meta", &encoded).await?;
        staged
            .persist(self.sidecar_path(&sidecar.identifier))
            .map_err(|err| CacheError::storage("commit.rename", err.error))?;

        let entry = self.entry_from(sidecar);
        rw_write(&self.index, SOURCE, "commit").insert(entry.identifier.clone(), entry.clone());
        Ok(entry)
    }

    async fn stage_bytes(&self, prefix: &str, bytes: &[u8]) -> CacheResult<TempPath> {
        let temp = tempfile::Builder::new()
            .prefix(prefix)
            .tempfile_in(&self.staging)
            .map_err(|err| CacheError::storage("stage.create", err))?;
        let (file, path) = temp.into_parts();
        let mut file = fs::File::from_std(file);
        file.write_all(bytes)
            .await
            .map_err(|err| CacheError::storage("stage.write", err))?;
        file.sync_all()
            .await
            .map_err(|err| CacheError::storage("stage.sync", err))?;
        Ok(path)
    }

    async fn copy_into_place(&self, source: &Path, destination: &Path) -> CacheResult<()> {
        let staged = tempfile::Builder::new()
            .prefix("move")
            .tempfile_in(&self.staging)
            .map_err(|err| CacheError::storage("move.stage", err))?
            .into_temp_path();
        match fs::copy(source, &staged).await {
            Ok(_) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(CacheError::SourceNotFound(source.to_path_buf()));
            }
            Err(err) => return Err(CacheError::storage("move.copy", err)),
        }
        staged
            .persist(destination)
            .map_err(|err| CacheError::storage("move.rename", err.error))?;
        discard_source(source).await;
        Ok(())
    }

    async fn ensure_shard(&self, identifier: &Identifier) -> CacheResult<()> {
        fs::create_dir_all(self.root.join(identifier.shard()))
            .await
            .map_err(|err| CacheError::storage("shard.create_dir", err))
    }

    fn content_path(&self, identifier: &Identifier) -> PathBuf {
        self.root.join(identifier.shard()).join(identifier.as_str())
    }

    fn sidecar_path(&self, identifier: &Identifier) -> PathBuf {
        self.root
            .join(identifier.shard())
            .join(format!("{identifier}{SIDECAR_SUFFIX}"))
    }

    fn entry_from(&self, sidecar: Sidecar) -> CacheEntry {
        CacheEntry {
            storage_path: self.content_path(&sidecar.identifier),
            extension: extension_of(&sidecar.display_name),
            identifier: sidecar.identifier,
            display_name: sidecar.display_name,
            size: sidecar.size,
            created_at: sidecar.created_at,
        }
    }

    async fn purge_staging(&self) -> io::Result<usize> {
        let mut purged = 0;
        let mut entries = fs::read_dir(&self.staging).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                fs::remove_file(entry.path()).await?;
                purged += 1;
            }
        }
        Ok(purged)
    }

    /// Load every well-formed entry found on disk.
    async fn scan(&self) -> io::Result<(Vec<CacheEntry>, usize)> {
        let mut loaded = Vec::new();
        let mut skipped = 0;

        let mut shards = fs::read_dir(&self.root).await?;
        while let Some(shard) = shards.next_entry().await? {
            let name = shard.file_name();
            let is_shard = name
                .to_str()
                .is_some_and(|value| value.len() == 2 && value.bytes().all(|b| b.is_ascii_hexdigit()));
            if !is_shard || !shard.file_type().await?.is_dir() {
                continue;
            }

            let mut files = fs::read_dir(shard.path()).await?;
            while let Some(file) = files.next_entry().await? {
                let file_name = file.file_name();
                let Some(file_name) = file_name.to_str() else {
                    continue;
                };
                let Some(stem) = file_name.strip_suffix(SIDECAR_SUFFIX) else {
                    if Identifier::parse(file_name).is_some()
                        && fs::metadata(shard.path().join(format!("{file_name}{SIDECAR_SUFFIX}")))
                            .await
                            .is_err()
                    {
                        warn!(
                            target = SOURCE,
                            op = "cache::scan",
                            result = "orphaned_content",
                            path = %file.path().display(),
                            "Content file has no metadata sidecar; ignoring"
                        );
                        skipped += 1;
                    }
                    continue;
                };

                match self.load_sidecar(stem, &file.path()).await {
                    Some(entry) => loaded.push(entry),
                    None => skipped += 1,
                }
            }
        }

        Ok((loaded, skipped))
    }

    async fn load_sidecar(&self, stem: &str, path: &Path) -> Option<CacheEntry> {
        let reject = |reason: &str| {
            warn!(
                target = SOURCE,
                op = "cache::scan",
                result = "invalid_sidecar",
                path = %path.display(),
                reason,
                "Skipping unusable cache sidecar"
            );
        };

        let raw = match fs::read(path).await {
            Ok(raw) => raw,
            Err(err) => {
                reject(&err.to_string());
                return None;
            }
        };
        let sidecar: Sidecar = match serde_json::from_slice(&raw) {
            Ok(sidecar) => sidecar,
            Err(err) => {
                reject(&err.to_string());
                return None;
            }
        };
        if sidecar.identifier.as_str() != stem {
            reject("identifier does not match file name");
            return None;
        }

        let entry = self.entry_from(sidecar);
        match fs::metadata(&entry.storage_path).await {
            Ok(meta) if meta.len() == entry.size => Some(entry),
            Ok(_) => {
                reject("content size does not match metadata");
                None
            }
            Err(_) => {
                reject("content file is missing");
                None
            }
        }
    }
}

fn stats_of(index: &HashMap<Identifier, CacheEntry>) -> CacheStats {
    CacheStats {
        entries: index.len(),
        total_bytes: index.values().map(|entry| entry.size).sum(),
    }
}

async fn discard_source(source: &Path) {
    match fs::remove_file(source).await {
        Ok(()) => {}
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => warn!(
            target = SOURCE,
            op = "cache::move",
            result = "discard_failed",
            source = %source.display(),
            error = %err,
            "Failed to delete adopted source file"
        ),
    }
}
