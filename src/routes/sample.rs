//! `/samples` route table.

use crate::handlers::sample::{create, delete, delete_many, list, read, search, update, update_many};
use crate::state::AppState;
use axum::{routing::get, Router};

/// Routes mounted under `/samples`.
pub fn sample_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create).put(update_many).delete(delete_many))
        .route("/search/:keys/:keyword", get(search))
        .route("/:id", get(read).put(update).delete(delete))
}
