use std::any::Any;
use std::time::Instant;

use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use docstash_api_types::REQUEST_ID_HEADER;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::application::error::ErrorReport;

use super::error::ApiError;

const RESPONSE_TARGET: &str = "docstash::http::response";

/// Which cache entry a request addresses, taken from the path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryTarget {
    /// `template` or `render`.
    pub collection: &'static str,
    pub identifier: String,
}

impl EntryTarget {
    /// `/template/{id}[/render]` and `/render/{id}`. `/template/render` is
    /// the inline route and has no entry.
    pub fn from_path(path: &str) -> Option<Self> {
        let mut segments = path.trim_start_matches('/').split('/');
        let collection = match segments.next()? {
            "template" => "template",
            "render" => "render",
            _ => return None,
        };
        let identifier = segments.next().filter(|segment| !segment.is_empty())?;
        if collection == "template" && identifier == "render" {
            return None;
        }
        Some(Self {
            collection,
            identifier: identifier.to_string(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    pub entry: Option<EntryTarget>,
}

pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let ctx = RequestContext {
        request_id: Uuid::new_v4().to_string(),
        entry: EntryTarget::from_path(request.uri().path()),
    };
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&ctx.request_id) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }
    response.extensions_mut().insert(ctx);
    response
}

pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let start = Instant::now();
    let ctx = request.extensions().get::<RequestContext>().cloned();

    let mut response = next.run(request).await;
    let status = response.status();
    let elapsed_ms = start.elapsed().as_millis() as u64;

    let request_id = ctx.as_ref().map_or("", |ctx| ctx.request_id.as_str());
    let (collection, identifier) = ctx
        .as_ref()
        .and_then(|ctx| ctx.entry.as_ref())
        .map_or(("", ""), |entry| (entry.collection, entry.identifier.as_str()));

    if !(status.is_client_error() || status.is_server_error()) {
        debug!(
            target = RESPONSE_TARGET,
            status = status.as_u16(),
            method = %method,
            path = %path,
            collection,
            identifier,
            elapsed_ms,
            request_id,
            "request completed",
        );
        return response;
    }

    let (source, chain) = response
        .extensions_mut()
        .remove::<ErrorReport>()
        .map_or(("unknown", Vec::new()), |report| (report.source, report.messages));
    let detail = chain.first().map_or("no diagnostic available", String::as_str);

    if status.is_server_error() {
        error!(
            target = RESPONSE_TARGET,
            status = status.as_u16(),
            method = %method,
            path = %path,
            collection,
            identifier,
            elapsed_ms,
            source,
            detail,
            chain = ?chain,
            request_id,
            "request failed",
        );
    } else {
        warn!(
            target = RESPONSE_TARGET,
            status = status.as_u16(),
            method = %method,
            path = %path,
            collection,
            identifier,
            elapsed_ms,
            source,
            detail,
            chain = ?chain,
            request_id,
            "client request error",
        );
    }

    response
}

/// Turn a handler panic into a generic 500 problem; the payload only reaches the logs.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else {
        "panic with non-string payload".to_string()
    };

    let mut response = ApiError::internal("An unexpected error occurred.").into_response();
    ErrorReport::from_message(
        "infra::http::panic",
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("handler panicked: {detail}"),
    )
    .attach(&mut response);
    response
}
