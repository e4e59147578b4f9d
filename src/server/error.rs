//! Mapping of chat failures onto HTTP responses.

use axum::http::header::RETRY_AFTER;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

use crate::agent_core::ChatError;

/// HTTP error response.
///
/// Every error serialises as `{"detail": ...}`: the structured quota payload
/// for 429s, the error message string otherwise.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: Value,
    retry_after: Option<u64>,
}

impl ApiError {
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            detail: Value::String(message.into()),
            retry_after: None,
        }
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::QuotaExceeded(translated) => Self {
                status: StatusCode::TOO_MANY_REQUESTS,
                retry_after: translated.retry_after_seconds,
                detail: serde_json::to_value(&translated)
                    .unwrap_or_else(|_| Value::String(translated.message.clone())),
            },
            ChatError::Internal { message } => Self::internal(message),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = (self.status, Json(json!({ "detail": self.detail }))).into_response();
        if let Some(seconds) = self.retry_after {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(seconds));
        }
        response
    }
}
