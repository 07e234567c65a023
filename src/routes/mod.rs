//! Router assembly.

mod common;
mod sample;

pub use common::common_routes;
pub use sample::sample_routes;

use crate::response::ResponseEnvelope;
use crate::state::AppState;
use axum::{extract::DefaultBodyLimit, http::StatusCode, Router};
use tower::ServiceBuilder;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

/// Largest accepted request body.
pub const BODY_LIMIT_BYTES: usize = 10 * 1024 * 1024;

async fn not_found() -> ResponseEnvelope {
    ResponseEnvelope::failure("Route not found", StatusCode::NOT_FOUND)
}

/// Full application router: common routes at the root, entities nested under their collection.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(common_routes())
        .nest("/samples", sample_routes())
        .fallback(not_found)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(DefaultBodyLimit::disable())
                .layer(RequestBodyLimitLayer::new(BODY_LIMIT_BYTES)),
        )
        .with_state(state)
}
