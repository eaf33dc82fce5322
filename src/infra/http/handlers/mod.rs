//! Route handlers and the response shapes they share.

mod meta;
mod renders;
mod templates;

pub use meta::{file_types, health, not_found};
pub use renders::{delete_report, get_report};
pub use templates::{
    delete_template, get_template, render_inline, render_template, upload_template,
};

use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use docstash_api_types::{
    REPORT_HASH_HEADER, REPORT_NAME_HEADER, STORAGE_WARNING_HEADER, TEMPLATE_HASH_HEADER,
};
use serde::Deserialize;

use crate::application::render::RenderedReport;
use crate::application::templates::TemplateService;
use crate::cache::Removal;
use crate::util::flags::query_flag;

use super::error::ApiError;

#[derive(Debug, Default, Deserialize)]
pub struct DownloadQuery {
    download: Option<String>,
}

impl DownloadQuery {
    pub fn requested(&self) -> bool {
        query_flag(self.download.as_deref())
    }
}

pub(super) fn json_rejection(rejection: JsonRejection) -> ApiError {
    ApiError::bad_request("Request body is not valid JSON", Some(rejection.body_text()))
}

fn header_value(value: &str) -> HeaderValue {
    HeaderValue::from_str(value).unwrap_or_else(|_| HeaderValue::from_static("invalid"))
}

/// `attachment` disposition with a header-safe file name.
fn attachment(name: &str) -> HeaderValue {
    let safe: String = name
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();
    header_value(&format!("attachment; filename=\"{safe}\""))
}

fn file_response(headers: HeaderMap, name: &str, content_type: &str, body: Bytes) -> Response {
    let length = body.len();
    let mut response = (StatusCode::OK, headers, Body::from(body)).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_DISPOSITION, attachment(name));
    headers.insert(header::CONTENT_TYPE, header_value(content_type));
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
    response
}

fn hash_header(name: &'static str, identifier: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(HeaderName::from_static(name), header_value(identifier));
    headers
}

/// Shared GET for templates and reports: metadata check, optional download.
async fn fetch_entry(
    templates: &TemplateService,
    identifier: &str,
    hash_header_name: &'static str,
    query: &DownloadQuery,
) -> Result<Response, ApiError> {
    let entry = templates.find(identifier)?;
    let headers = hash_header(hash_header_name, entry.identifier.as_str());
    if !query.requested() {
        return Ok((StatusCode::OK, headers).into_response());
    }

    let content = templates.read(identifier).await?;
    Ok(file_response(
        headers,
        &entry.display_name,
        &entry.content_type(),
        content,
    ))
}

async fn delete_entry(templates: &TemplateService, identifier: &str) -> Result<Response, ApiError> {
    let Removal {
        storage_warning, ..
    } = templates.remove(identifier).await?;
    let mut response = StatusCode::OK.into_response();
    if let Some(warning) = storage_warning {
        response.headers_mut().insert(
            HeaderName::from_static(STORAGE_WARNING_HEADER),
            header_value(&warning),
        );
    }
    Ok(response)
}

fn report_response(rendered: RenderedReport) -> Response {
    let mut headers = hash_header(TEMPLATE_HASH_HEADER, rendered.template.identifier.as_str());
    headers.insert(
        HeaderName::from_static(REPORT_NAME_HEADER),
        header_value(&rendered.report_name),
    );
    if let Some(cached) = &rendered.cached {
        headers.insert(
            HeaderName::from_static(REPORT_HASH_HEADER),
            header_value(cached.identifier.as_str()),
        );
    }
    file_response(
        headers,
        &rendered.report_name,
        &rendered.content_type,
        rendered.report,
    )
}
