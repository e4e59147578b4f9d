//! Model provider configuration.
//!
//! Deserialized from the `gemini:` section of the app config. Every field has
//! a default so an empty section (or none at all) yields a working client
//! once `GEMINI_API_KEY` is supplied.

use std::time::Duration;

use serde::Deserialize;

use super::errors::InferenceError;

/// Public REST endpoint of the Gemini API.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Model used for both planning and execution turns.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Sampling temperature for both turns.
pub const DEFAULT_TEMPERATURE: f32 = 0.3;

/// System instruction sent with every session.
pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "I say high, you say low";

/// Upper bound on automatic function-calling rounds per message.
pub const DEFAULT_MAX_REMOTE_CALLS: u32 = 10;

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

/// Runtime configuration of the Gemini provider.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub system_instruction: String,
    pub max_remote_calls: u32,
    pub request_timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
            max_remote_calls: DEFAULT_MAX_REMOTE_CALLS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl ModelConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// `generateContent` endpoint for the configured model.
    pub fn generate_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }

    /// Reject values the provider would refuse anyway.
    pub fn validate(&self) -> Result<(), InferenceError> {
        if self.model.trim().is_empty() {
            return Err(InferenceError::ConfigError {
                reason: "model name is empty".into(),
            });
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(InferenceError::ConfigError {
                reason: format!("temperature {} outside 0.0..=2.0", self.temperature),
            });
        }
        if self.request_timeout_secs == 0 {
            return Err(InferenceError::ConfigError {
                reason: "request_timeout_secs must be positive".into(),
            });
        }
        Ok(())
    }
}
