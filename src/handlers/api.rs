use axum::{Json, extract::State, response::IntoResponse};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

use crate::core::registry::SessionSummary;
use crate::state::AppState;

/// Health check handler
pub async fn health_check() -> impl IntoResponse {
    Json(json!({ "status": "OK" }))
}

/// Response body for `GET /sessions`
#[derive(Debug, Serialize)]
pub struct SessionsResponse {
    pub active_sessions: usize,
    pub sessions: Vec<SessionSummary>,
}

/// List live chat sessions
pub async fn list_sessions(State(state): State<Arc<AppState>>) -> Json<SessionsResponse> {
    let sessions = state.sessions.snapshot();
    Json(SessionsResponse {
        active_sessions: sessions.len(),
        sessions,
    })
}
