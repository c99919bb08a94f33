pub mod error;
mod form;
mod handlers;
mod middleware;
mod state;

pub use middleware::REQUEST_ID_HEADER;
pub use state::HttpState;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, post},
};

use middleware::{log_responses, set_request_context};

/// Assemble the publishing API. `max_request_bytes` caps JSON and form bodies.
pub fn build_router(state: HttpState, max_request_bytes: usize) -> Router {
    Router::new()
        .route("/", get(handlers::index).post(handlers::publish_json))
        .route("/jsonhtmlgen", post(handlers::publish_json))
        .route("/htmlgen", post(handlers::publish_form))
        .route("/pdfgen", get(handlers::convert_pdf))
        .route("/health", get(handlers::health))
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_request_bytes))
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}
