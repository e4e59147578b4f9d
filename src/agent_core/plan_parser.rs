//! Plan extraction from a planning-mode model response.
//!
//! In planning mode the provider does not execute tools, so any tool-call
//! part in the response is a proposal. Proposals become a human-readable
//! plan plus a `planned` [`ToolCall`] per proposal. A response without
//! proposals is returned as plain text.

use serde_json::{Map, Value};

use super::types::{ChatResponse, ToolCall};
use crate::inference::{Part, RawModelResponse};
use crate::normalize::{stringify, Payload};

/// Text used when the model produced no text at all.
pub const NO_RESPONSE_PLACEHOLDER: &str = "No response generated";

const PLAN_HEADER: &str = "Here's my plan:";
const CONFIRMATION_PROMPT: &str = "\nShall I proceed with this plan?";

/// Turn a planning response into a plan, or into its text when the model
/// proposed nothing.
pub fn extract_plan(response: &RawModelResponse) -> ChatResponse {
    let mut lines = vec![PLAN_HEADER.to_string()];
    let mut tool_calls = Vec::new();

    for part in response.parts() {
        if let Part::ToolCall { name, arguments } = part {
            lines.push(describe_call(name, arguments.as_ref()));
            tool_calls.push(ToolCall::planned(name, arguments.clone()));
        }
    }

    if tool_calls.is_empty() {
        return ChatResponse::text(response_text(response));
    }

    lines.push(CONFIRMATION_PROMPT.to_string());
    ChatResponse {
        response: lines.join("\n"),
        is_plan: true,
        tool_calls,
    }
}

/// The model's text, or the placeholder when it is absent or empty.
pub fn response_text(response: &RawModelResponse) -> String {
    response
        .text()
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| NO_RESPONSE_PLACEHOLDER.to_string())
}

fn describe_call(name: &str, arguments: Option<&Map<String, Value>>) -> String {
    let formatted = format_arguments(arguments);
    if formatted.is_empty() {
        format!("- Call tool {name}")
    } else {
        format!("- Call tool {name} with arguments: {formatted}")
    }
}

/// `k='v', ...` using each value's display form.
pub fn format_arguments(arguments: Option<&Map<String, Value>>) -> String {
    arguments
        .map(|args| {
            args.iter()
                .map(|(key, value)| format!("{key}='{}'", stringify(&Payload::from(value))))
                .collect::<Vec<_>>()
                .join(", ")
        })
        .unwrap_or_default()
}

// ─── Tests ───────────────────────────────────────────────────────────────────
