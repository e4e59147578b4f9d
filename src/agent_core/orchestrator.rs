//! Plan / execute orchestration.
//!
//! `get_plan` runs a planning-mode exchange and describes what the model
//! wants to call; `execute_plan` runs the same conversation in execution
//! mode and reports what was actually called. Both classify failures into
//! [`ChatError`].

use std::sync::Arc;

use thiserror::Error;
use tracing::Instrument;
use uuid::Uuid;

use super::error_translation::{translate, TranslatedError};
use super::errors::AgentError;
use super::ledger::ToolCallLedger;
use super::plan_parser::{extract_plan, response_text};
use super::session::{SessionManager, SessionMode, SessionSettings};
use super::types::{ChatRequest, ChatResponse};
use crate::inference::{LlmProvider, RawModelResponse};
use crate::mcp_client::ToolConnector;

/// Failure of a plan or execute request.
#[derive(Debug, Error)]
pub enum ChatError {
    /// The provider's quota is exhausted; carries retry guidance.
    #[error("{}", .0.message)]
    QuotaExceeded(TranslatedError),

    /// Anything else, with the underlying error's message.
    #[error("{message}")]
    Internal { message: String },
}

impl From<AgentError> for ChatError {
    fn from(err: AgentError) -> Self {
        match translate(&err) {
            Some(translated) => ChatError::QuotaExceeded(translated),
            None => {
                tracing::error!(error = %err, "chat request failed");
                ChatError::Internal {
                    message: err.to_string(),
                }
            }
        }
    }
}

/// Entry point of the two chat flows.
pub struct ChatService {
    sessions: SessionManager,
}

impl ChatService {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        connector: Arc<dyn ToolConnector>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            sessions: SessionManager::new(provider, connector, settings),
        }
    }

    /// Ask the model what it would do, without running any tool.
    pub async fn get_plan(&self, request: &ChatRequest) -> Result<ChatResponse, ChatError> {
        let raw = self.run(SessionMode::Planning, request).await?;
        let plan = extract_plan(&raw);
        tracing::info!(
            is_plan = plan.is_plan,
            tool_calls = plan.tool_calls.len(),
            "plan extracted"
        );
        Ok(plan)
    }

    /// Let the model run its tools and report what happened.
    pub async fn execute_plan(&self, request: &ChatRequest) -> Result<ChatResponse, ChatError> {
        let raw = self.run(SessionMode::Execution, request).await?;
        let tool_calls = ToolCallLedger::from_response(&raw).into_calls();
        tracing::info!(tool_calls = tool_calls.len(), "execution finished");
        Ok(ChatResponse {
            response: response_text(&raw),
            is_plan: false,
            tool_calls,
        })
    }

    async fn run(
        &self,
        mode: SessionMode,
        request: &ChatRequest,
    ) -> Result<RawModelResponse, ChatError> {
        let span = tracing::info_span!(
            "chat",
            request_id = %Uuid::new_v4(),
            mode = mode.as_str(),
            history_len = request.history().len(),
        );
        async {
            tracing::info!("chat request started");
            self.sessions
                .exchange(mode, request.history(), &request.message)
                .await
                .map_err(ChatError::from)
        }
        .instrument(span)
        .await
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
