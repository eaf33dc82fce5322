use axum::Json;
use axum::extract::State;
use docstash_api_types::{FileTypesResponse, HealthResponse};

use crate::infra::http::error::ApiError;
use crate::infra::http::state::AppState;

pub async fn file_types(State(state): State<AppState>) -> Json<FileTypesResponse> {
    Json(FileTypesResponse {
        dictionary: state.renders.file_types().into_dictionary(),
    })
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let stats = state.templates.stats();
    Json(HealthResponse {
        status: "ok".to_string(),
        entries: stats.entries,
        total_bytes: stats.total_bytes,
    })
}

pub async fn not_found() -> ApiError {
    ApiError::not_found("Route not found")
}
