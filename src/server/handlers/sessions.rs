use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::core::errors::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct NewSessionRequest {
    pub question: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RenameSessionRequest {
    pub name: String,
}

pub async fn list_sessions(State(state): State<Arc<AppState>>) -> Json<Value> {
    let sessions = state.sessions.lock().await;
    Json(json!({
        "sessions": sessions.list_sessions(),
        "active_session": sessions.active_session(),
    }))
}

pub async fn new_session(
    State(state): State<Arc<AppState>>,
    payload: Option<Json<NewSessionRequest>>,
) -> Result<Json<Value>, ApiError> {
    let question = payload.as_ref().and_then(|Json(p)| p.question.as_deref());
    let documents = state.engine.lock().await.document_snapshot();

    let session = state
        .sessions
        .lock()
        .await
        .create_session(question, documents)?;

    Ok(Json(json!({
        "message": "New session created",
        "session": session,
    })))
}

/// Fetch a session, make it active, and swap in its vector index so follow-up
/// questions hit the documents this session was chatting with.
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let session = {
        let mut sessions = state.sessions.lock().await;
        sessions.get_session(&session_id)?.clone()
    };

    let index_loaded = {
        let mut engine = state.engine.lock().await;
        engine
            .activate_session(&session_id, &session.documents, state.model.as_ref())
            .await?
    };
    if !index_loaded && !session.documents.is_empty() {
        tracing::warn!(
            "Session {} has documents but no index could be rebuilt; re-upload required",
            session_id
        );
    }

    Ok(Json(json!({
        "session": session,
        "index_loaded": index_loaded,
    })))
}

pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state.sessions.lock().await.delete_session(&session_id)?;
    Ok(Json(json!({ "message": "Session deleted" })))
}

pub async fn rename_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(request): Json<RenameSessionRequest>,
) -> Result<Json<Value>, ApiError> {
    state
        .sessions
        .lock()
        .await
        .rename_session(&session_id, &request.name)?;
    Ok(Json(json!({
        "message": "Session renamed",
        "name": request.name.trim(),
    })))
}
