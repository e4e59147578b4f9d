//! LLM provider seam.
//!
//! The agent core talks to the model only through these two traits, which
//! keeps it testable with scripted providers.

use async_trait::async_trait;

use super::errors::InferenceError;
use super::types::{ChatConfig, RawModelResponse};
use crate::mcp_client::ToolSource;

/// A model backend able to run tool-aware chat sessions.
pub trait LlmProvider: Send + Sync {
    /// Start a chat whose tools come from `tools`.
    ///
    /// The session lives no longer than the tool source it borrows.
    fn start_chat<'a>(
        &'a self,
        config: ChatConfig,
        tools: &'a dyn ToolSource,
    ) -> Box<dyn ChatSession + 'a>;
}

/// A stateful chat: each `send` sees every earlier message of the session.
#[async_trait]
pub trait ChatSession: Send {
    async fn send(&mut self, text: &str) -> Result<RawModelResponse, InferenceError>;
}
