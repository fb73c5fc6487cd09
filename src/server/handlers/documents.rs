use std::sync::Arc;

use axum::extract::{Multipart, Path, State};
use axum::Json;
use serde_json::{json, Value};

use crate::core::errors::ApiError;
use crate::state::AppState;

/// Accept a multipart upload and index it. An `add_to_existing` field set to
/// "true" appends to the live index instead of replacing it.
pub async fn upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut add_to_existing = false;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::InvalidInput(format!("malformed multipart body: {}", e)))?
    {
        match field.name() {
            Some("file") => {
                let filename = field
                    .file_name()
                    .map(str::to_string)
                    .ok_or_else(|| ApiError::InvalidInput("No selected file".to_string()))?;
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::InvalidInput(format!("failed to read upload: {}", e)))?;
                file = Some((filename, bytes.to_vec()));
            }
            Some("add_to_existing") => {
                let text = field.text().await.unwrap_or_default();
                add_to_existing = text.eq_ignore_ascii_case("true");
            }
            _ => {}
        }
    }

    let (filename, bytes) = file
        .ok_or_else(|| ApiError::InvalidInput("No file part in the request".to_string()))?;
    if bytes.is_empty() {
        return Err(ApiError::InvalidInput("No selected file".to_string()));
    }
    if bytes.len() > state.config.server.max_upload_bytes {
        return Err(ApiError::InvalidInput(format!(
            "File exceeds the maximum upload size of {} bytes",
            state.config.server.max_upload_bytes
        )));
    }

    let active_session = state
        .sessions
        .lock()
        .await
        .active_session()
        .map(str::to_string);

    let mut engine = state.engine.lock().await;
    let outcome = engine
        .upload(
            &bytes,
            &filename,
            add_to_existing,
            active_session.as_deref(),
            state.model.as_ref(),
        )
        .await?;

    Ok(Json(json!({
        "message": "File processed successfully",
        "document_id": outcome.document_id,
        "filename": outcome.filename,
        "chunks_created": outcome.chunk_count,
        "pages_processed": outcome.page_count,
        "total_documents": outcome.total_documents,
        "added_to_existing": outcome.added_to_existing,
    })))
}

pub async fn list_documents(State(state): State<Arc<AppState>>) -> Json<Value> {
    let engine = state.engine.lock().await;
    Json(json!({
        "documents": engine.documents(),
        "count": engine.documents().len(),
    }))
}

pub async fn remove_document(
    State(state): State<Arc<AppState>>,
    Path(document_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let mut engine = state.engine.lock().await;
    let (record, remaining) = engine
        .remove_document(&document_id, state.model.as_ref())
        .await?;

    Ok(Json(json!({
        "message": format!("Document '{}' removed successfully", record.filename),
        "filename": record.filename,
        "remaining_documents": remaining,
    })))
}

#[derive(Debug, serde::Deserialize)]
pub struct ClearRequest {
    pub clear_history: Option<bool>,
}

/// Wipe documents, the index and uploads; chat sessions go too unless
/// `clear_history` is explicitly false.
pub async fn clear_all(
    State(state): State<Arc<AppState>>,
    payload: Option<Json<ClearRequest>>,
) -> Result<Json<Value>, ApiError> {
    let clear_history = payload
        .and_then(|Json(p)| p.clear_history)
        .unwrap_or(true);

    state.engine.lock().await.clear()?;
    if clear_history {
        state.sessions.lock().await.clear_all()?;
    }
    tracing::info!("Database cleared (history cleared: {})", clear_history);
    Ok(Json(json!({ "message": "All data cleared" })))
}

/// Rebuild the index from the last persisted document snapshot.
pub async fn restore(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let mut engine = state.engine.lock().await;
    let restored = engine.restore(state.model.as_ref()).await?;
    if !restored {
        return Err(ApiError::NotFound(
            "No previous session to restore".to_string(),
        ));
    }

    Ok(Json(json!({
        "message": "Session restored successfully",
        "documents": engine.documents().len(),
    })))
}
