use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::core::errors::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub question: String,
    /// Target session; defaults to the active one, creating a session when
    /// none exists.
    pub session_id: Option<String>,
}

pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<Value>, ApiError> {
    let question = request.question.trim();
    if question.is_empty() {
        return Err(ApiError::InvalidInput("Question cannot be empty".to_string()));
    }

    let engine = state.engine.lock().await;
    let result = engine.answer(state.model.as_ref(), question).await?;
    let documents = engine.document_snapshot();
    drop(engine);

    let mut sessions = state.sessions.lock().await;
    let session_id = match request
        .session_id
        .or_else(|| sessions.active_session().map(str::to_string))
    {
        Some(id) => id,
        None => {
            sessions
                .create_session(Some(question), documents.clone())?
                .id
        }
    };

    if !sessions.append_message(
        &session_id,
        question,
        &result.answer,
        result.citations.clone(),
        documents,
    )? {
        return Err(ApiError::NotFound("Session not found".to_string()));
    }

    Ok(Json(json!({
        "answer": result.answer,
        "citations": result.citations,
        "question": result.question,
        "session_id": session_id,
    })))
}
