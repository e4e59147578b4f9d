//! Inference error types.
//!
//! All errors implement `std::error::Error` via `thiserror`. Structured logging
//! is the caller's responsibility. These types carry the context needed to
//! build meaningful log entries and to classify provider failures.

use std::fmt;

use serde_json::Value;
use thiserror::Error;

/// Errors that can occur while talking to the model provider.
#[derive(Debug, Error)]
pub enum InferenceError {
    /// TCP/HTTP connection to the provider failed.
    #[error("connection failed to {endpoint}: {reason}")]
    ConnectionFailed { endpoint: String, reason: String },

    /// The provider did not respond within the configured timeout.
    #[error("inference timeout after {duration_secs}s")]
    Timeout { duration_secs: u64 },

    /// The provider rejected the request (HTTP 4xx).
    #[error("provider rejected request: {0}")]
    Client(#[source] ClientError),

    /// The provider failed while serving the request (HTTP 5xx).
    #[error("provider server error HTTP {status}: {body}")]
    Server { status: u16, body: String },

    /// A success response whose body could not be understood.
    #[error("invalid provider response: {reason}")]
    InvalidResponse { reason: String },

    /// Configuration loading or validation error.
    #[error("config error: {reason}")]
    ConfigError { reason: String },
}

impl InferenceError {
    /// The provider client error, if this is one.
    pub fn client_error(&self) -> Option<&ClientError> {
        match self {
            InferenceError::Client(err) => Some(err),
            _ => None,
        }
    }
}

// ─── ClientError ─────────────────────────────────────────────────────────────

/// A 4xx rejection from the provider, as reported in its error envelope.
///
/// `details` holds the whole decoded error body, so structured entries such
/// as `RetryInfo` or `Help` are reachable at `details.error.details[]`.
#[derive(Debug, Clone)]
pub struct ClientError {
    pub code: u16,
    pub status: Option<String>,
    pub message: Option<String>,
    pub details: Value,
}

impl ClientError {
    /// Build from an HTTP status and the raw response body.
    ///
    /// The body is expected to be `{"error": {"code", "message", "status",
    /// "details"}}`. A body that is not JSON is kept as `{"message": body}`.
    pub fn from_response(http_status: u16, body: &str) -> Self {
        let details: Value = serde_json::from_str(body)
            .unwrap_or_else(|_| serde_json::json!({ "message": body }));

        let envelope = details.get("error").unwrap_or(&details);
        let code = envelope
            .get("code")
            .and_then(Value::as_u64)
            .and_then(|c| u16::try_from(c).ok())
            .unwrap_or(http_status);
        let status = envelope
            .get("status")
            .and_then(Value::as_str)
            .map(str::to_string);
        let message = envelope
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string);

        Self {
            code,
            status,
            message,
            details,
        }
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code)?;
        if let Some(status) = &self.status {
            write!(f, " {status}")?;
        }
        if let Some(message) = &self.message {
            write!(f, ". {message}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ClientError {}
