//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

use std::{net::SocketAddr, num::NonZeroU64, path::PathBuf, str::FromStr, time::Duration};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::util::bytes::parse_byte_size;

pub use cli::{CacheOverride, CliArgs, Command, ServeArgs, ServeOverrides, StatsArgs};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "docstash";
const ENV_PREFIX: &str = "DOCSTASH";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_CACHE_DIR: &str = "/tmp/docstash-files";
const DEFAULT_UPLOAD_FIELD_NAME: &str = "template";
const DEFAULT_UPLOAD_FILE_SIZE: &str = "25MB";
const DEFAULT_RENDER_ENGINE: &str = "docstash-render";
const DEFAULT_RENDER_WORK_DIR: &str = "/tmp/docstash-render";
const DEFAULT_RENDER_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub cache: CacheSettings,
    pub uploads: UploadSettings,
    pub render: RenderSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub directory: PathBuf,
}

#[derive(Debug, Clone)]
pub struct UploadSettings {
    pub field_name: String,
    pub max_file_bytes: NonZeroU64,
}

#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub engine_path: PathBuf,
    pub work_dir: PathBuf,
    pub timeout: Duration,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Stats(args)) => raw.apply_cache_override(&args.cache),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    cache: RawCacheSettings,
    uploads: RawUploadSettings,
    render: RawRenderSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(name) = overrides.uploads_field_name.as_ref() {
            self.uploads.field_name = Some(name.clone());
        }
        if let Some(size) = overrides.uploads_max_file_size.as_ref() {
            self.uploads.max_file_size = Some(size.clone());
        }
        if let Some(path) = overrides.render_engine_path.as_ref() {
            self.render.engine_path = Some(path.clone());
        }
        if let Some(seconds) = overrides.render_timeout_seconds {
            self.render.timeout_seconds = Some(seconds);
        }

        self.apply_cache_override(&overrides.cache);
    }

    fn apply_cache_override(&mut self, overrides: &CacheOverride) {
        if let Some(directory) = overrides.cache_directory.as_ref() {
            self.cache.directory = Some(directory.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            cache,
            uploads,
            render,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            cache: build_cache_settings(cache)?,
            uploads: build_upload_settings(uploads)?,
            render: build_render_settings(render)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let directory = cache
        .directory
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_DIR));
    if directory.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "cache.directory",
            "path must not be empty",
        ));
    }

    Ok(CacheSettings { directory })
}

fn build_upload_settings(uploads: RawUploadSettings) -> Result<UploadSettings, LoadError> {
    let field_name = uploads
        .field_name
        .map(|value| value.trim().to_string())
        .unwrap_or_else(|| DEFAULT_UPLOAD_FIELD_NAME.to_string());
    if field_name.is_empty() {
        return Err(LoadError::invalid(
            "uploads.field_name",
            "must not be empty",
        ));
    }

    let size = uploads
        .max_file_size
        .unwrap_or_else(|| DEFAULT_UPLOAD_FILE_SIZE.to_string());
    let bytes = parse_byte_size(&size)
        .map_err(|err| LoadError::invalid("uploads.max_file_size", err.to_string()))?;
    let max_file_bytes = NonZeroU64::new(bytes)
        .ok_or_else(|| LoadError::invalid("uploads.max_file_size", "must be greater than zero"))?;
    usize::try_from(bytes).map_err(|_| {
        LoadError::invalid(
            "uploads.max_file_size",
            "value exceeds supported range for usize",
        )
    })?;

    Ok(UploadSettings {
        field_name,
        max_file_bytes,
    })
}

fn build_render_settings(render: RawRenderSettings) -> Result<RenderSettings, LoadError> {
    let engine_path = render
        .engine_path
        .unwrap_or_else(|| PathBuf::from(DEFAULT_RENDER_ENGINE));
    if engine_path.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "render.engine_path",
            "path must not be empty",
        ));
    }

    let work_dir = render
        .work_dir
        .unwrap_or_else(|| PathBuf::from(DEFAULT_RENDER_WORK_DIR));
    if work_dir.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "render.work_dir",
            "path must not be empty",
        ));
    }

    let timeout_secs = render
        .timeout_seconds
        .unwrap_or(DEFAULT_RENDER_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Err(LoadError::invalid(
            "render.timeout_seconds",
            "must be greater than zero",
        ));
    }

    Ok(RenderSettings {
        engine_path,
        work_dir,
        timeout: Duration::from_secs(timeout_secs),
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    directory: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawUploadSettings {
    field_name: Option<String>,
    max_file_size: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRenderSettings {
    engine_path: Option<PathBuf>,
    work_dir: Option<PathBuf>,
    timeout_seconds: Option<u64>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}
