//! Provider-neutral response and session types.
//!
//! The provider adapter turns its wire format into a [`RawModelResponse`];
//! plan extraction and the tool-call ledger only ever see these types.

use serde_json::{Map, Value};

use crate::normalize::Payload;

// ─── Response ────────────────────────────────────────────────────────────────

/// One piece of model output.
#[derive(Debug, Clone)]
pub enum Part {
    /// Free text.
    Text(String),
    /// A tool invocation the model asked for (executed or not).
    ToolCall {
        name: String,
        arguments: Option<Map<String, Value>>,
    },
    /// The result of a tool invocation, as fed back to the model.
    ToolResult { name: String, payload: Payload },
}

/// A candidate answer: an ordered list of parts.
#[derive(Debug, Clone, Default)]
pub struct Candidate {
    pub parts: Vec<Part>,
}

/// The raw response of one session exchange.
#[derive(Debug, Clone, Default)]
pub struct RawModelResponse {
    pub candidates: Vec<Candidate>,
}

impl RawModelResponse {
    /// Build a single-candidate response.
    pub fn from_parts(parts: Vec<Part>) -> Self {
        Self {
            candidates: vec![Candidate { parts }],
        }
    }

    /// Parts of the first candidate; empty when there is none.
    pub fn parts(&self) -> &[Part] {
        self.candidates
            .first()
            .map(|c| c.parts.as_slice())
            .unwrap_or(&[])
    }

    /// Concatenated text parts of the first candidate, `None` if there are none.
    pub fn text(&self) -> Option<String> {
        let mut texts = self.parts().iter().filter_map(|part| match part {
            Part::Text(text) => Some(text.as_str()),
            _ => None,
        });
        let first = texts.next()?;
        Some(texts.fold(first.to_string(), |mut acc, t| {
            acc.push_str(t);
            acc
        }))
    }
}

// ─── Session Configuration ───────────────────────────────────────────────────

/// Per-session settings handed to the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatConfig {
    pub system_instruction: String,
    pub temperature: f32,
    /// When `true`, the provider executes proposed tool calls itself and
    /// feeds the results back before returning.
    pub automatic_function_calling: bool,
}

// ─── Tests ───────────────────────────────────────────────────────────────────
