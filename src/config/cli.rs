use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};

/// Command-line arguments for the docstash binary.
#[derive(Debug, Parser)]
#[command(
    name = "docstash",
    version,
    about = "Content-addressed template cache and render service"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "DOCSTASH_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP service.
    Serve(Box<ServeArgs>),
    /// Open the cache and print entry count and total size as JSON.
    Stats(StatsArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct StatsArgs {
    #[command(flatten)]
    pub cache: CacheOverride,
}

#[derive(Debug, Args, Default, Clone)]
pub struct CacheOverride {
    /// Override the cache root directory.
    #[arg(long = "cache-directory", env = "CACHE_DIR", value_name = "PATH")]
    pub cache_directory: Option<PathBuf>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub cache: CacheOverride,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the multipart field carrying uploaded templates.
    #[arg(long = "uploads-field-name", env = "UPLOAD_FIELD_NAME", value_name = "NAME")]
    pub uploads_field_name: Option<String>,

    /// Override the upload size limit (`25MB`, `512k`, plain bytes).
    #[arg(long = "uploads-max-file-size", env = "UPLOAD_FILE_SIZE", value_name = "SIZE")]
    pub uploads_max_file_size: Option<String>,

    /// Override the render engine executable.
    #[arg(long = "render-engine-path", value_name = "PATH")]
    pub render_engine_path: Option<PathBuf>,

    /// Override the render engine timeout.
    #[arg(long = "render-timeout-seconds", value_name = "SECONDS")]
    pub render_timeout_seconds: Option<u64>,
}
