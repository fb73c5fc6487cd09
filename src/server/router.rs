use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method};
use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{chat, documents, health, sessions};
use crate::state::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin([
            HeaderValue::from_static("http://localhost:3000"),
            HeaderValue::from_static("http://localhost:5173"),
            HeaderValue::from_static("http://127.0.0.1:3000"),
            HeaderValue::from_static("http://127.0.0.1:5173"),
        ])
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    // Multipart bodies carry whole documents; lift axum's default body limit
    // to the configured maximum.
    let body_limit = DefaultBodyLimit::max(state.config.server.max_upload_bytes);

    Router::new()
        .route("/health", get(health::health))
        .route("/upload", post(documents::upload))
        .route("/documents", get(documents::list_documents))
        .route("/documents/:document_id", delete(documents::remove_document))
        .route("/chat", post(chat::chat))
        .route("/chat/sessions", get(sessions::list_sessions))
        .route("/chat/session/new", post(sessions::new_session))
        .route(
            "/chat/session/:session_id",
            get(sessions::get_session).delete(sessions::delete_session),
        )
        .route(
            "/chat/session/:session_id/rename",
            put(sessions::rename_session),
        )
        .route("/clear", post(documents::clear_all))
        .route("/restore", post(documents::restore))
        .layer(body_limit)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
