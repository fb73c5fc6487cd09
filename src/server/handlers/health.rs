use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::state::AppState;

pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let model_available = state.model.health_check().await.unwrap_or(false);
    let engine = state.engine.lock().await;

    Json(json!({
        "status": "ok",
        "model": state.model.name(),
        "model_available": model_available,
        "index_ready": engine.has_index(),
        "documents": engine.documents().len(),
    }))
}
