//! Agent Core: plan / confirm / execute orchestration.
//!
//! Submodules:
//! - `session`: Ephemeral provider sessions bound to a fresh tool connection
//! - `plan_parser`: Plan extraction from planning-mode responses
//! - `ledger`: Tool-call reconstruction from execution-mode responses
//! - `error_translation`: Quota / rate-limit classification of provider errors
//! - `orchestrator`: `get_plan` and `execute_plan`
//! - `types`: Request, response and tool-call types
//! - `errors`: Agent-level error types

pub mod error_translation;
pub mod errors;
pub mod ledger;
pub mod orchestrator;
pub mod plan_parser;
pub mod session;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

// Re-exports for convenience
pub use error_translation::{translate, TranslatedError};
pub use errors::AgentError;
pub use ledger::ToolCallLedger;
pub use orchestrator::{ChatError, ChatService};
pub use session::{SessionManager, SessionMode, SessionSettings};
pub use types::{ChatRequest, ChatResponse, ConversationTurn, Role, ToolCall, ToolCallStatus};
