//! Conversation-log inspection endpoints.

use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::Json;
use serde_json::{json, Value};

use crate::conversation_store::SessionLog;
use crate::error::ApiError;
use crate::state::AppState;

pub async fn list(State(state): State<AppState>) -> Json<HashMap<String, SessionLog>> {
    Json(state.conversations.snapshot().await)
}

pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionLog>, ApiError> {
    state
        .conversations
        .session(&session_id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Session not found"))
}

pub async fn clear(State(state): State<AppState>) -> Json<Value> {
    state.conversations.clear().await;
    Json(json!({ "cleared": true }))
}
