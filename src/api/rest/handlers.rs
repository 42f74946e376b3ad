use std::sync::Arc;

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::api::rest::error::{ApiError, ApiResult};
use crate::api::rest::state::{AppState, DEFAULT_SESSION};

#[derive(Debug, Deserialize)]
pub struct AgentRequest {
    pub message: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub session: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AgentResponse {
    pub reply: String,
}

#[derive(Debug, Deserialize)]
pub struct OverrideRequest {
    pub api_key: Option<String>,
}

pub async fn version() -> Json<Value> {
    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn agent(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AgentRequest>,
) -> ApiResult<Json<AgentResponse>> {
    if req.message.trim().is_empty() {
        return Err(ApiError::BadRequest("message must not be empty".into()));
    }

    let session_id = req
        .session
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_SESSION);
    info!(session = %session_id, model = %req.model, "Agent request");

    let session = state.session(session_id).await;
    let mut conversation = session.lock().await;
    let reply = state
        .client
        .generate_agent_response(&mut conversation, &req.message, &req.model)
        .await?;

    Ok(Json(AgentResponse { reply }))
}

pub async fn set_override(
    State(state): State<Arc<AppState>>,
    Json(req): Json<OverrideRequest>,
) -> Json<Value> {
    let credentials = state.client.credentials();
    credentials.set_override(req.api_key);
    let active = credentials.has_override();
    info!("Credential override {}", if active { "set" } else { "cleared" });
    Json(json!({ "override_active": active }))
}
