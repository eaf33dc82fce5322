use std::io;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::domain::entries::CacheEntry;
use crate::domain::file_types::FileTypes;
use crate::util::flags::deserialize_truthy;

/// Caller-supplied render options.
///
/// Keys the service does not interpret (locale, timezone, …) are kept in
/// `extra` and handed to the engine untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderOptions {
    #[serde(default)]
    pub convert_to: Option<String>,
    #[serde(default)]
    pub report_name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_truthy")]
    pub cache_report: bool,
    #[serde(default, deserialize_with = "deserialize_truthy")]
    pub overwrite: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Output format and file name resolved for one render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderTarget {
    pub convert_to: String,
    pub report_name: String,
}

/// Everything an engine needs to produce one report.
#[derive(Debug)]
pub struct RenderJob<'a> {
    pub template: &'a CacheEntry,
    pub content: Bytes,
    pub data: &'a Value,
    pub target: &'a RenderTarget,
    pub options: &'a Map<String, Value>,
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("render engine unavailable: {0}")]
    Unavailable(#[source] io::Error),
    #[error("render engine failed (exit {exit_code:?}): {stderr}")]
    Engine {
        exit_code: Option<i32>,
        stderr: String,
    },
    #[error("render engine timed out after {0:?}")]
    Timeout(Duration),
    #[error("render engine produced an empty report")]
    EmptyOutput,
    #[error("render workspace error: {0}")]
    Io(#[source] io::Error),
}

/// Boundary to the external document rendering engine.
#[async_trait]
pub trait RenderEngine: Send + Sync {
    async fn render(&self, job: RenderJob<'_>) -> Result<Bytes, RenderError>;

    /// Conversions the engine supports.
    fn file_types(&self) -> FileTypes {
        FileTypes::builtin()
    }
}
