pub mod protocol;
pub mod render;
pub mod rest;
pub mod state;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, post, put},
    Router,
};
use std::sync::Arc;

pub use rest::{
    analyse_handler, ask_handler, create_session_handler, delete_session_handler,
    set_api_key_handler, transcript_handler,
};
pub use state::AppState;

/// Multipart framing and the prompt field on top of the screenshot itself.
const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Builds the API router. CORS and the Swagger UI are layered on by the binary.
pub fn router(app_state: Arc<AppState>) -> Router {
    let body_limit = app_state.config.max_upload_bytes + MULTIPART_OVERHEAD_BYTES;

    Router::new()
        .route("/sessions", post(create_session_handler))
        .route("/sessions/{session_id}", delete(delete_session_handler))
        .route("/sessions/{session_id}/api-key", put(set_api_key_handler))
        .route("/sessions/{session_id}/analysis", post(analyse_handler))
        .route(
            "/sessions/{session_id}/messages",
            post(ask_handler).get(transcript_handler),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(app_state)
}
