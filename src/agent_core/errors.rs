//! Agent Core error types.

use thiserror::Error;

use crate::inference::InferenceError;
use crate::mcp_client::McpError;

/// Errors raised while running a session exchange.
///
/// Both variants keep the underlying error as their `source()`, so the
/// error translator can walk down to the provider's client error.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The model provider failed.
    #[error("model request failed: {0}")]
    Inference(#[from] InferenceError),

    /// The tool connection could not be opened or used.
    #[error("tool transport failed: {0}")]
    ToolTransport(#[from] McpError),
}
