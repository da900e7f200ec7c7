//! Request handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::dispatch::ToolResult;
use crate::error::{AppError, Result};
use crate::orchestrator::{round_usd, AlternativesBundle};
use crate::provider::traits::ConversationOptions;
use crate::AppState;

/// Liveness probe
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Registered providers in priority order
pub async fn list_providers(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({ "providers": state.orchestrator.provider_names() }))
}

/// Running cost total
pub async fn usage(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "total_cost": round_usd(state.orchestrator.total_cost()),
        "currency": "USD",
    }))
}

/// Execute a named operation through the dispatcher
pub async fn execute_operation(
    State(state): State<Arc<AppState>>,
    Json(input): Json<Value>,
) -> (StatusCode, Json<ToolResult>) {
    let result = state.dispatcher.execute(&input).await;
    let status = if result.success {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    (status, Json(result))
}

#[derive(Debug, Deserialize)]
pub struct AlternativesRequest {
    pub prompt: String,
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub output_dir: Option<String>,
    #[serde(default)]
    pub cost_limit: Option<f64>,
}

/// Fan out to every available provider
pub async fn generate_alternatives(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AlternativesRequest>,
) -> Result<Json<AlternativesBundle>> {
    if request.prompt.trim().is_empty() {
        return Err(AppError::InvalidRequest("prompt must not be empty".to_string()));
    }

    let request_id = request
        .request_id
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let output_dir = request
        .output_dir
        .unwrap_or_else(|| state.settings.orchestrator.output_dir.clone());
    let cost_limit = request
        .cost_limit
        .or(state.settings.orchestrator.default_cost_limit);

    info!(request_id = %request_id, "Alternatives requested");

    state
        .orchestrator
        .generate_alternatives(&request.prompt, &output_dir, &request_id, cost_limit)
        .await
        .map(Json)
        .ok_or_else(|| {
            AppError::NoImagesGenerated(format!(
                "request {} produced no images (cost limit reached, no provider available, \
                 or every provider failed)",
                request_id
            ))
        })
}

#[derive(Debug, Deserialize)]
pub struct CreateConversationRequest {
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(flatten)]
    pub options: ConversationOptions,
}

/// Open a multi-turn session
pub async fn create_conversation(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateConversationRequest>,
) -> Result<Json<Value>> {
    let handle = state
        .orchestrator
        .create_conversation(request.provider.as_deref(), request.options)?;
    Ok(Json(json!({ "conversation_id": handle })))
}

/// Release a session; unknown ids succeed as well
pub async fn close_conversation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> StatusCode {
    state.orchestrator.close_conversation(&id);
    StatusCode::NO_CONTENT
}
