use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::application::render::METRIC_RENDER_MS;
use crate::cache::{METRIC_MOVE_TOTAL, METRIC_READ_TOTAL, METRIC_REMOVE_TOTAL, METRIC_WRITE_TOTAL};
use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            METRIC_WRITE_TOTAL,
            Unit::Count,
            "Cache writes by outcome (stored, deduplicated, overwritten, error kinds)."
        );
        describe_counter!(
            METRIC_MOVE_TOTAL,
            Unit::Count,
            "Files adopted into the cache by outcome."
        );
        describe_counter!(
            METRIC_READ_TOTAL,
            Unit::Count,
            "Cache reads by outcome."
        );
        describe_counter!(
            METRIC_REMOVE_TOTAL,
            Unit::Count,
            "Cache removals by outcome, including orphaned files."
        );
        describe_histogram!(
            METRIC_RENDER_MS,
            Unit::Milliseconds,
            "Report render latency in milliseconds."
        );
    });
}
