//! Gemini `generateContent` wire format.
//!
//! Only the fields this crate reads or writes are modelled. Unknown part
//! fields (e.g. `thoughtSignature`) are kept in `extra` so model turns can be
//! echoed back in the conversation history unchanged.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::errors::InferenceError;
use super::types::{Candidate, Part, RawModelResponse};
use crate::mcp_client::McpToolDefinition;
use crate::normalize::Payload;

// ─── Contents ────────────────────────────────────────────────────────────────

/// One conversation turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<WirePart>,
}

impl Content {
    pub fn user_text(text: &str) -> Self {
        Self {
            role: Some("user".into()),
            parts: vec![WirePart::text(text)],
        }
    }

    pub fn user_parts(parts: Vec<WirePart>) -> Self {
        Self {
            role: Some("user".into()),
            parts,
        }
    }

    /// System instruction content (no role).
    pub fn instruction(text: &str) -> Self {
        Self {
            role: None,
            parts: vec![WirePart::text(text)],
        }
    }
}

/// A single part of a turn. Exactly one payload field is normally set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WirePart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_response: Option<FunctionResponse>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl WirePart {
    pub fn text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            ..Self::default()
        }
    }

    /// Reply to `call` with a JSON response object.
    pub fn function_response(call: &FunctionCall, response: Value) -> Self {
        Self {
            function_response: Some(FunctionResponse {
                id: call.id.clone(),
                name: call.name.clone(),
                response,
            }),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub response: Value,
}

// ─── Request ─────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest<'a> {
    pub contents: &'a [Content],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Tool>,
    pub generation_config: GenerationConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerationConfig {
    pub temperature: f32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    pub function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionDeclaration {
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub parameters_json_schema: Value,
}

/// Declare MCP tools to the model. No tools means no `tools` entry at all.
pub fn tool_declarations(tools: &[McpToolDefinition]) -> Vec<Tool> {
    if tools.is_empty() {
        return Vec::new();
    }
    vec![Tool {
        function_declarations: tools
            .iter()
            .map(|t| FunctionDeclaration {
                name: t.name.clone(),
                description: t.description.clone(),
                parameters_json_schema: t.input_schema.clone(),
            })
            .collect(),
    }]
}

// ─── Response ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<WireCandidate>,
    #[serde(default)]
    pub prompt_feedback: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireCandidate {
    #[serde(default)]
    pub content: Option<Content>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

impl GenerateContentResponse {
    /// Content of the first candidate, tagged with the `model` role.
    pub fn model_turn(&self) -> Option<Content> {
        let mut content = self.candidates.first()?.content.clone()?;
        content.role.get_or_insert_with(|| "model".into());
        Some(content)
    }

    /// Function calls proposed by the first candidate, in order.
    pub fn function_calls(&self) -> Vec<FunctionCall> {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.function_call.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Convert into the provider-neutral response.
    pub fn into_raw(self) -> RawModelResponse {
        let candidates = self
            .candidates
            .into_iter()
            .map(|candidate| Candidate {
                parts: candidate
                    .content
                    .map(|content| content.parts.into_iter().filter_map(convert_part).collect())
                    .unwrap_or_default(),
            })
            .collect();
        RawModelResponse { candidates }
    }
}

fn convert_part(part: WirePart) -> Option<Part> {
    if let Some(call) = part.function_call {
        return Some(Part::ToolCall {
            name: call.name,
            arguments: call.args,
        });
    }
    if let Some(reply) = part.function_response {
        return Some(Part::ToolResult {
            name: reply.name,
            payload: Payload::from(reply.response),
        });
    }
    match (part.text, part.thought) {
        (Some(text), thought) if thought != Some(true) => Some(Part::Text(text)),
        _ => None,
    }
}

/// Parse a successful `generateContent` body.
pub fn parse_generate_response(body: &str) -> Result<GenerateContentResponse, InferenceError> {
    serde_json::from_str(body).map_err(|e| InferenceError::InvalidResponse {
        reason: format!("failed to parse generateContent response: {e}"),
    })
}

// ─── Tests ───────────────────────────────────────────────────────────────────
