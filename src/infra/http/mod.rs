//! HTTP surface: routes, error mapping and request logging.

pub mod error;
pub mod handlers;
mod middleware;
mod state;

pub use state::AppState;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, post},
};
use tower_http::catch_panic::CatchPanicLayer;

use middleware::{log_responses, panic_response, set_request_context};

/// Headroom for multipart boundaries and part headers on top of the file limit.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

pub fn build_router(state: AppState) -> Router {
    let body_limit = usize::try_from(state.uploads.max_bytes())
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD_BYTES);

    Router::new()
        .route("/template", post(handlers::upload_template))
        .route("/template/render", post(handlers::render_inline))
        .route(
            "/template/{id}",
            get(handlers::get_template).delete(handlers::delete_template),
        )
        .route("/template/{id}/render", post(handlers::render_template))
        .route(
            "/render/{id}",
            get(handlers::get_report).delete(handlers::delete_report),
        )
        .route("/fileTypes", get(handlers::file_types))
        .route("/health", get(handlers::health))
        .fallback(handlers::not_found)
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}
