use axum::extract::{Path, Query, State};
use axum::response::Response;
use docstash_api_types::REPORT_HASH_HEADER;

use crate::infra::http::error::ApiError;
use crate::infra::http::state::AppState;

use super::{DownloadQuery, delete_entry, fetch_entry};

pub async fn get_report(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, ApiError> {
    fetch_entry(&state.templates, &identifier, REPORT_HASH_HEADER, &query).await
}

pub async fn delete_report(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> Result<Response, ApiError> {
    delete_entry(&state.templates, &identifier).await
}
