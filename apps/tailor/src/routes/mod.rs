pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::state::AppState;
use crate::storage::{handlers as storage_handlers, MAX_UPLOAD_BYTES};
use crate::tailoring::handlers as tailoring_handlers;

/// Multipart framing on top of the largest accepted file.
const BODY_LIMIT_SLACK: usize = 64 * 1024;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Working document
        .route("/upload", post(storage_handlers::handle_upload))
        .route("/current-resume", get(storage_handlers::handle_current_resume))
        // Background context
        .route(
            "/rag-context",
            get(storage_handlers::handle_get_context).post(storage_handlers::handle_update_context),
        )
        // Tailoring
        .route("/tailor", post(tailoring_handlers::handle_tailor))
        .route(
            "/compiled/:filename",
            get(storage_handlers::handle_download_compiled),
        )
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + BODY_LIMIT_SLACK))
        .with_state(state)
}
