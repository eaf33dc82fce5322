use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use docstash_api_types::{PROBLEM_CONTENT_TYPE, ProblemBody};

use crate::application::error::ErrorReport;
use crate::application::render::{RenderError, RenderServiceError};
use crate::cache::CacheError;
use crate::infra::uploads::UploadStagingError;

pub mod codes {
    pub const BAD_REQUEST: &str = "bad_request";
    pub const NOT_FOUND: &str = "not_found";
    pub const INVALID_INPUT: &str = "invalid_input";
    pub const INVALID_ENCODING: &str = "invalid_encoding";
    pub const SOURCE_NOT_FOUND: &str = "source_not_found";
    pub const STORAGE_FAILURE: &str = "storage_failure";
    pub const PAYLOAD_TOO_LARGE: &str = "payload_too_large";
    pub const RENDER_FAILED: &str = "render_failed";
    pub const RENDER_UNAVAILABLE: &str = "render_unavailable";
    pub const RENDER_TIMEOUT: &str = "render_timeout";
    pub const INTERNAL: &str = "internal_error";
}

/// Error response rendered as `application/problem+json`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    title: &'static str,
    detail: Option<String>,
    report: Option<ErrorReport>,
}

impl ApiError {
    pub fn new(
        status: StatusCode,
        code: &'static str,
        title: &'static str,
        detail: Option<String>,
    ) -> Self {
        Self {
            status,
            code,
            title,
            detail,
            report: None,
        }
    }

    pub fn bad_request(title: &'static str, detail: Option<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, codes::BAD_REQUEST, title, detail)
    }

    pub fn not_found(title: &'static str) -> Self {
        Self::new(StatusCode::NOT_FOUND, codes::NOT_FOUND, title, None)
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            codes::INTERNAL,
            "Internal server error",
            Some(detail.into()),
        )
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Keep the full error chain for the response logger.
    fn with_report(mut self, source: &'static str, error: &dyn std::error::Error) -> Self {
        self.report = Some(ErrorReport::from_error(source, self.status, error));
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let report = self.report.unwrap_or_else(|| {
            ErrorReport::from_message(
                "infra::http",
                self.status,
                format!(
                    "{}: {}",
                    self.code,
                    self.detail.as_deref().unwrap_or(self.title)
                ),
            )
        });
        let body = ProblemBody {
            kind: self.code.to_string(),
            title: self.title.to_string(),
            status: self.status.as_u16(),
            detail: self.detail,
        };
        let mut response = (self.status, Json(body)).into_response();
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(PROBLEM_CONTENT_TYPE),
        );
        report.attach(&mut response);
        response
    }
}

impl From<CacheError> for ApiError {
    fn from(error: CacheError) -> Self {
        let api = match &error {
            CacheError::InvalidInput(message) => Self::new(
                StatusCode::BAD_REQUEST,
                codes::INVALID_INPUT,
                "Invalid input",
                Some(message.clone()),
            ),
            CacheError::InvalidEncoding { .. } => Self::new(
                StatusCode::BAD_REQUEST,
                codes::INVALID_ENCODING,
                "Content could not be decoded",
                Some(error.to_string()),
            ),
            CacheError::NotFound(identifier) => Self::new(
                StatusCode::NOT_FOUND,
                codes::NOT_FOUND,
                "Entry not found",
                Some(format!("No entry for identifier `{identifier}`.")),
            ),
            CacheError::SourceNotFound(_) => Self::new(
                StatusCode::BAD_REQUEST,
                codes::SOURCE_NOT_FOUND,
                "Uploaded file is gone",
                Some("The staged upload disappeared before it was stored; upload it again.".to_string()),
            ),
            // Paths and OS errors stay in the logs.
            CacheError::StorageFailure { .. } => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                codes::STORAGE_FAILURE,
                "Storage failure",
                None,
            ),
        };
        api.with_report("infra::http::cache_error", &error)
    }
}

impl From<RenderError> for ApiError {
    fn from(error: RenderError) -> Self {
        let api = match &error {
            RenderError::Engine { stderr, .. } => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                codes::RENDER_FAILED,
                "Render failed",
                Some(stderr.clone()).filter(|detail| !detail.is_empty()),
            ),
            RenderError::EmptyOutput => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                codes::RENDER_FAILED,
                "Render failed",
                Some(error.to_string()),
            ),
            RenderError::Io(_) => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                codes::RENDER_FAILED,
                "Render failed",
                None,
            ),
            RenderError::Unavailable(_) => Self::new(
                StatusCode::SERVICE_UNAVAILABLE,
                codes::RENDER_UNAVAILABLE,
                "Render engine unavailable",
                None,
            ),
            RenderError::Timeout(_) => Self::new(
                StatusCode::GATEWAY_TIMEOUT,
                codes::RENDER_TIMEOUT,
                "Render timed out",
                Some(error.to_string()),
            ),
        };
        api.with_report("infra::http::render_error", &error)
    }
}

impl From<RenderServiceError> for ApiError {
    fn from(error: RenderServiceError) -> Self {
        match error {
            RenderServiceError::Cache(err) => err.into(),
            RenderServiceError::Render(err) => err.into(),
        }
    }
}

impl From<UploadStagingError> for ApiError {
    fn from(error: UploadStagingError) -> Self {
        let api = match &error {
            UploadStagingError::EmptyPayload => Self::new(
                StatusCode::BAD_REQUEST,
                codes::INVALID_INPUT,
                "Invalid input",
                Some("Uploaded file is empty.".to_string()),
            ),
            UploadStagingError::PayloadTooLarge { .. } => Self::new(
                StatusCode::PAYLOAD_TOO_LARGE,
                codes::PAYLOAD_TOO_LARGE,
                "Uploaded file is too large",
                Some(error.to_string()),
            ),
            UploadStagingError::PayloadStream { .. } => {
                Self::bad_request("Upload stream failed", Some(error.to_string()))
            }
            UploadStagingError::Io(_) => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                codes::STORAGE_FAILURE,
                "Storage failure",
                None,
            ),
        };
        api.with_report("infra::http::upload_error", &error)
    }
}
