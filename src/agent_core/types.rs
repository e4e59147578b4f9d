//! Shared types for the agent core.
//!
//! These are the request/response shapes of the plan and execute flows.
//! Field names on the wire match the HTTP API the frontend already speaks.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ─── Requests ────────────────────────────────────────────────────────────────

/// Who authored a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One prior turn of the conversation, oldest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: &str) -> Self {
        Self {
            role: Role::User,
            content: content.to_string(),
        }
    }

    pub fn assistant(content: &str) -> Self {
        Self {
            role: Role::Assistant,
            content: content.to_string(),
        }
    }
}

/// Body of both `/chat` and `/execute`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    /// Omitted and `null` both mean "no history".
    #[serde(default)]
    pub history: Option<Vec<ConversationTurn>>,
}

impl ChatRequest {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
            history: None,
        }
    }

    pub fn with_history(mut self, history: Vec<ConversationTurn>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn history(&self) -> &[ConversationTurn] {
        self.history.as_deref().unwrap_or(&[])
    }
}

// ─── Tool Calls ──────────────────────────────────────────────────────────────

/// Lifecycle state of a tool call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCallStatus {
    /// Proposed by the model, not yet run.
    Planned,
    /// Run by the provider, no result seen yet.
    Called,
    /// Result received.
    Completed,
    /// Reserved for results that represent an error.
    Failed,
}

/// One tool invocation as reported to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    pub status: ToolCallStatus,
    #[serde(rename = "args", default)]
    pub arguments: Option<Map<String, Value>>,
    #[serde(default)]
    pub result_text: Option<String>,
}

impl ToolCall {
    pub fn planned(name: &str, arguments: Option<Map<String, Value>>) -> Self {
        Self {
            name: name.to_string(),
            status: ToolCallStatus::Planned,
            arguments,
            result_text: None,
        }
    }

    pub fn called(name: &str, arguments: Option<Map<String, Value>>) -> Self {
        Self {
            name: name.to_string(),
            status: ToolCallStatus::Called,
            arguments,
            result_text: None,
        }
    }

    /// A result that arrived with no matching call.
    pub fn orphan_result(name: &str, result_text: String) -> Self {
        Self {
            name: name.to_string(),
            status: ToolCallStatus::Completed,
            arguments: None,
            result_text: Some(result_text),
        }
    }
}

// ─── Responses ───────────────────────────────────────────────────────────────

/// Response of both `/chat` and `/execute`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    #[serde(default)]
    pub is_plan: bool,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
}

impl ChatResponse {
    /// A plain text answer with no tool calls.
    pub fn text(response: String) -> Self {
        Self {
            response,
            is_plan: false,
            tool_calls: Vec::new(),
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
