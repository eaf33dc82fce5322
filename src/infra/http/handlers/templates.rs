use axum::Json;
use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use docstash_api_types::TEMPLATE_HASH_HEADER;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use crate::application::render::RenderOptions;
use crate::application::templates::InlineTemplate;
use crate::infra::http::error::ApiError;
use crate::infra::http::state::AppState;
use crate::infra::uploads::UploadStagingError;

use super::{DownloadQuery, delete_entry, fetch_entry, hash_header, json_rejection, report_response};

const SOURCE: &str = "infra::http::templates";

#[derive(Debug, Default, Deserialize)]
pub struct RenderRequest {
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub options: RenderOptions,
}

#[derive(Debug, Default, Deserialize)]
pub struct InlineRenderRequest {
    #[serde(default)]
    pub template: InlineTemplate,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub options: RenderOptions,
}

pub async fn upload_template(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    let mut multipart = multipart
        .map_err(|err| ApiError::bad_request("Invalid multipart payload", Some(err.body_text())))?;
    let limit_bytes = state.uploads.max_bytes();

    while let Some(field) = multipart.next_field().await.map_err(|err| {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::from(UploadStagingError::PayloadTooLarge { limit_bytes })
        } else {
            ApiError::bad_request("Invalid multipart payload", Some(err.body_text()))
        }
    })? {
        if field.name() != Some(&*state.upload_field) {
            continue;
        }

        let original_name = field
            .file_name()
            .map(str::to_string)
            .unwrap_or_else(|| state.upload_field.to_string());
        let stream = field.map(|chunk| {
            chunk.map_err(|err| {
                if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
                    UploadStagingError::PayloadTooLarge { limit_bytes }
                } else {
                    UploadStagingError::PayloadStream {
                        source: Box::new(err),
                    }
                }
            })
        });

        let staged = state.uploads.stage_stream(stream).await?;
        let entry = state
            .templates
            .adopt_upload(&staged.path, &original_name)
            .await?;

        info!(
            target = SOURCE,
            op = "template::upload",
            result = "ok",
            identifier = %entry.identifier,
            display_name = %entry.display_name,
            size_bytes = staged.size_bytes,
            "Template uploaded"
        );

        let identifier = entry.identifier.to_string();
        return Ok((
            StatusCode::OK,
            hash_header(TEMPLATE_HASH_HEADER, &identifier),
            identifier,
        )
            .into_response());
    }

    Err(ApiError::bad_request(
        "Template file not provided",
        Some(format!(
            "Expected a file in multipart field `{}`.",
            state.upload_field
        )),
    ))
}

pub async fn render_inline(
    State(state): State<AppState>,
    payload: Result<Json<InlineRenderRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload.map_err(json_rejection)?;
    let entry = state
        .templates
        .store_inline(&request.template, request.options.overwrite)
        .await?;
    let rendered = state
        .renders
        .render(entry.identifier.as_str(), &request.data, &request.options)
        .await?;
    Ok(report_response(rendered))
}

pub async fn render_template(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
    payload: Result<Json<RenderRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload.map_err(json_rejection)?;
    let rendered = state
        .renders
        .render(&identifier, &request.data, &request.options)
        .await?;
    Ok(report_response(rendered))
}

pub async fn get_template(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, ApiError> {
    fetch_entry(&state.templates, &identifier, TEMPLATE_HASH_HEADER, &query).await
}

pub async fn delete_template(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> Result<Response, ApiError> {
    delete_entry(&state.templates, &identifier).await
}
