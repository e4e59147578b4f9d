//! Inference: the tool-aware LLM provider.
//!
//! This module handles all communication with the model:
//! - The provider-neutral seam (`LlmProvider`, `ChatSession`) the agent uses
//! - The Gemini `generateContent` wire format and REST client
//! - Automatic function calling against an MCP tool source
//! - Provider error classification (`ClientError` for 4xx rejections)

pub mod client;
pub mod config;
pub mod errors;
pub mod protocol;
pub mod provider;
pub mod types;

// Re-exports for convenience
pub use client::GeminiClient;
pub use config::ModelConfig;
pub use errors::{ClientError, InferenceError};
pub use provider::{ChatSession, LlmProvider};
pub use types::{Candidate, ChatConfig, Part, RawModelResponse};
