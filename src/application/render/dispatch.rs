use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use metrics::histogram;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::application::templates::TemplateService;
use crate::cache::{CacheError, CacheErrorKind};
use crate::domain::entries::{CacheEntry, content_type_for};
use crate::domain::file_types::FileTypes;

use super::naming::resolve_target;
use super::types::{RenderEngine, RenderError, RenderJob, RenderOptions};

const SOURCE: &str = "application::render::dispatch";

pub(crate) const METRIC_RENDER_MS: &str = "docstash_render_ms";

#[derive(Debug, Error)]
pub enum RenderServiceError {
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Render(#[from] RenderError),
}

/// A rendered report, ready to be sent back to the caller.
#[derive(Debug, Clone)]
pub struct RenderedReport {
    pub report: Bytes,
    pub report_name: String,
    pub content_type: String,
    pub template: CacheEntry,
    /// Entry under which the report was cached, when caching was requested
    /// and succeeded.
    pub cached: Option<CacheEntry>,
}

#[derive(Clone)]
pub struct RenderService {
    templates: Arc<TemplateService>,
    engine: Arc<dyn RenderEngine>,
}

impl RenderService {
    pub fn new(templates: Arc<TemplateService>, engine: Arc<dyn RenderEngine>) -> Self {
        Self { templates, engine }
    }

    pub fn file_types(&self) -> FileTypes {
        self.engine.file_types()
    }

    pub async fn render(
        &self,
        template_id: &str,
        data: &Value,
        options: &RenderOptions,
    ) -> Result<RenderedReport, RenderServiceError> {
        let started_at = Instant::now();
        let template = self.templates.find(template_id)?;
        let target = resolve_target(&template, options)?;

        if let Some(extension) = template.extension.as_deref()
            && extension != target.convert_to
        {
            let file_types = self.engine.file_types();
            if file_types.dictionary().contains_key(extension)
                && !file_types.supports(extension, &target.convert_to)
            {
                return Err(CacheError::invalid_input(format!(
                    "Cannot convert `{extension}` templates to `{}`.",
                    target.convert_to
                ))
                .into());
            }
        }

        let content = self.templates.read(template_id).await?;
        let result = self
            .engine
            .render(RenderJob {
                template: &template,
                content,
                data,
                target: &target,
                options: &options.extra,
            })
            .await;

        let elapsed_ms = started_at.elapsed().as_secs_f64() * 1000.0;
        let outcome = if result.is_ok() { "ok" } else { "error" };
        histogram!(METRIC_RENDER_MS, "result" => outcome).record(elapsed_ms);
        let report = result?;

        let cached = if options.cache_report {
            match self
                .templates
                .cache_rendered(&report, &target.report_name)
                .await
            {
                Ok(entry) => Some(entry),
                Err(err) => {
                    warn!(
                        target = SOURCE,
                        op = "render::cache_report",
                        result = "error",
                        error_kind = err.kind().as_str(),
                        error = %err,
                        template = %template.identifier,
                        "Rendered report could not be cached"
                    );
                    None
                }
            }
        } else {
            None
        };

        info!(
            target = SOURCE,
            op = "render::dispatch",
            result = "ok",
            template = %template.identifier,
            convert_to = %target.convert_to,
            report_bytes = report.len(),
            cached = cached.is_some(),
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            "Template rendered"
        );

        Ok(RenderedReport {
            content_type: content_type_for(&target.report_name),
            report,
            report_name: target.report_name,
            template,
            cached,
        })
    }
}

impl RenderServiceError {
    /// Cache failure class, when the error came from the store.
    pub fn cache_kind(&self) -> Option<CacheErrorKind> {
        match self {
            Self::Cache(err) => Some(err.kind()),
            Self::Render(_) => None,
        }
    }
}
