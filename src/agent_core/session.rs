//! Conversation sessions.
//!
//! Every exchange opens a fresh tool connection, starts a provider chat bound
//! to it, replays the caller's history, sends the new message and closes the
//! connection again. Nothing is pooled or reused across requests.

use std::sync::Arc;

use super::errors::AgentError;
use super::types::ConversationTurn;
use crate::inference::{ChatConfig, LlmProvider, ModelConfig, RawModelResponse};
use crate::mcp_client::{ToolConnector, ToolSource};

/// Which half of the plan/execute protocol a session serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    /// Tools are advertised but never executed.
    Planning,
    /// The provider executes proposed tools before answering.
    Execution,
}

impl SessionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionMode::Planning => "planning",
            SessionMode::Execution => "execution",
        }
    }
}

/// Chat settings shared by both modes.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub system_instruction: String,
    pub temperature: f32,
}

impl From<&ModelConfig> for SessionSettings {
    fn from(config: &ModelConfig) -> Self {
        Self {
            system_instruction: config.system_instruction.clone(),
            temperature: config.temperature,
        }
    }
}

/// Opens and runs ephemeral sessions.
pub struct SessionManager {
    provider: Arc<dyn LlmProvider>,
    connector: Arc<dyn ToolConnector>,
    settings: SessionSettings,
}

impl SessionManager {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        connector: Arc<dyn ToolConnector>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            provider,
            connector,
            settings,
        }
    }

    pub fn chat_config(&self, mode: SessionMode) -> ChatConfig {
        ChatConfig {
            system_instruction: self.settings.system_instruction.clone(),
            temperature: self.settings.temperature,
            automatic_function_calling: mode == SessionMode::Execution,
        }
    }

    /// Run one exchange and return the provider's raw response.
    ///
    /// The tool connection is closed on success and on error. If the
    /// returned future is dropped mid-flight, the connection's `Drop`
    /// releases it instead.
    pub async fn exchange(
        &self,
        mode: SessionMode,
        history: &[ConversationTurn],
        message: &str,
    ) -> Result<RawModelResponse, AgentError> {
        let mut connection = self.connector.connect().await?;
        tracing::debug!(
            mode = mode.as_str(),
            tool_count = connection.tools().len(),
            "tool connection opened"
        );

        let outcome = self
            .converse(connection.as_source(), mode, history, message)
            .await;

        connection.close().await;
        outcome
    }

    async fn converse(
        &self,
        tools: &dyn ToolSource,
        mode: SessionMode,
        history: &[ConversationTurn],
        message: &str,
    ) -> Result<RawModelResponse, AgentError> {
        let mut chat = self.provider.start_chat(self.chat_config(mode), tools);

        // Prior turns are resent as plain messages; their role is not forwarded.
        for (index, turn) in history.iter().enumerate() {
            tracing::debug!(index, role = ?turn.role, "replaying history turn");
            chat.send(&turn.content).await?;
        }

        Ok(chat.send(message).await?)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
