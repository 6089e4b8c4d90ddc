use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use serde_json::{json, Value};
use tracing::debug;

use acis_core::onboarding::{ChatReply, ChatRequest, OnboardingState};
use acis_core::types::SessionId;

use crate::error::ApiError;
use crate::middleware::Authenticated;
use crate::state::AppState;

// GET /, no auth required
pub async fn root() -> Json<Value> {
    Json(json!({ "message": "LLM Onboarding Server is running" }))
}

// GET /api/health, no auth required
pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "tools": state.tool_source,
    }))
}

// POST /chat
pub async fn chat(
    _auth: Authenticated,
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatReply>, ApiError> {
    let Json(body) = payload?;
    let message = body.message.trim();
    if message.is_empty() {
        return Err(ApiError::BadRequest("Message must not be empty".into()));
    }

    let session_id = SessionId::from_request(body.session_id.as_deref());
    debug!(session = %session_id, "Chat request");

    let reply = state
        .workflow
        .process_message(&session_id, message)
        .await
        .map_err(|e| ApiError::Internal(format!("Error processing message: {}", e)))?;
    Ok(Json(reply))
}

// GET /session/{id}/state
pub async fn session_state(
    _auth: Authenticated,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<OnboardingState>, ApiError> {
    let session_id = SessionId::from_request(Some(&id));
    Ok(Json(state.workflow.state(&session_id).await?))
}

// DELETE /session/{id}
pub async fn reset_session(
    _auth: Authenticated,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let session_id = SessionId::from_request(Some(&id));
    state.workflow.reset(&session_id).await?;
    Ok(Json(json!({ "message": "Session reset successfully" })))
}

// GET /sessions
pub async fn list_sessions(
    _auth: Authenticated,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, ApiError> {
    let sessions: Vec<String> = state
        .workflow
        .sessions()
        .await?
        .into_iter()
        .map(|s| s.0)
        .collect();
    Ok(Json(json!({ "sessions": sessions })))
}
