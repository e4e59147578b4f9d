//! Handlers for the plan and execute endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use super::error::ApiError;
use super::ServerState;
use crate::agent_core::{ChatRequest, ChatResponse};

/// `POST /chat`: propose a plan without running tools.
pub(crate) async fn plan(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let response = state.chat.get_plan(&request).await?;
    Ok(Json(response))
}

/// `POST /execute`: run the conversation with tool execution enabled.
pub(crate) async fn execute(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let response = state.chat.execute_plan(&request).await?;
    Ok(Json(response))
}
