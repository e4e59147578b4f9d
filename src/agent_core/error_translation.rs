//! Provider error classification.
//!
//! Walks an error's `source()` chain looking for the provider's
//! [`ClientError`]. Quota and rate-limit rejections become a structured
//! [`TranslatedError`] carrying the retry delay and help links the provider
//! attached; everything else is left for the caller to report generically.

use std::error::Error;

use serde::Serialize;
use serde_json::Value;

use crate::inference::ClientError;

/// Machine-readable kind of a translated quota error.
pub const QUOTA_ERROR_KIND: &str = "GEMINI_QUOTA_EXCEEDED";

/// Human-readable message of a translated quota error.
pub const QUOTA_ERROR_MESSAGE: &str =
    "Gemini API quota exceeded. Please wait before retrying or review your Gemini plan.";

const RESOURCE_EXHAUSTED: &str = "RESOURCE_EXHAUSTED";

/// Upper bound on the number of errors inspected in one chain.
const MAX_CAUSE_DEPTH: usize = 32;

/// Structured payload returned to clients for quota failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranslatedError {
    #[serde(rename = "error")]
    pub kind: String,
    pub message: String,
    pub provider_status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_message: Option<String>,
    #[serde(rename = "links", skip_serializing_if = "Vec::is_empty")]
    pub help_links: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_seconds: Option<u64>,
}

/// Classify `error`. Returns `None` unless the chain holds a quota rejection.
pub fn translate(error: &(dyn Error + 'static)) -> Option<TranslatedError> {
    let translated = translate_client_error(find_client_error(error)?)?;
    tracing::warn!(
        retry_after = ?translated.retry_after_seconds,
        provider_message = translated.provider_message.as_deref().unwrap_or(""),
        "Gemini quota exceeded"
    );
    Some(translated)
}

/// Classify a client error found by other means.
pub fn translate_client_error(error: &ClientError) -> Option<TranslatedError> {
    let status = non_empty(error.status.as_deref()).map(str::to_uppercase);
    if error.code != 429 && status.as_deref() != Some(RESOURCE_EXHAUSTED) {
        return None;
    }

    let entries = detail_entries(&error.details);
    let retry_after_seconds = entries
        .iter()
        .filter(|entry| has_type_suffix(entry, "RetryInfo"))
        .find_map(|entry| entry.get("retryDelay").and_then(parse_retry_delay));
    let help_links = entries
        .iter()
        .filter(|entry| has_type_suffix(entry, "Help"))
        .flat_map(|entry| help_urls(entry))
        .collect();

    Some(TranslatedError {
        kind: QUOTA_ERROR_KIND.to_string(),
        message: QUOTA_ERROR_MESSAGE.to_string(),
        provider_status: status.unwrap_or_else(|| RESOURCE_EXHAUSTED.to_string()),
        provider_message: non_empty(error.message.as_deref()).map(str::to_string),
        help_links,
        retry_after_seconds,
    })
}

fn find_client_error<'a>(error: &'a (dyn Error + 'static)) -> Option<&'a ClientError> {
    // Nested enum errors can share one address, so identity includes the vtable.
    let mut visited: Vec<*const dyn Error> = Vec::new();
    let mut current = Some(error);

    while let Some(err) = current {
        let identity = err as *const dyn Error;
        let seen = visited.iter().any(|prior| std::ptr::eq(*prior, identity));
        if seen || visited.len() >= MAX_CAUSE_DEPTH {
            break;
        }
        visited.push(identity);
        if let Some(found) = err.downcast_ref::<ClientError>() {
            return Some(found);
        }
        current = err.source();
    }

    None
}

// ─── Detail Entries ──────────────────────────────────────────────────────────

/// Structured entries, wherever the provider nested them.
///
/// `details` may itself be the entry list, or a mapping whose `details` or
/// `error` key holds either the list or a mapping with its own `details`.
fn detail_entries(details: &Value) -> Vec<&Value> {
    match details {
        Value::Array(items) => items.iter().collect(),
        Value::Object(map) => {
            let mut entries = Vec::new();
            for key in ["details", "error"] {
                match map.get(key) {
                    Some(Value::Array(items)) => entries.extend(items),
                    Some(Value::Object(inner)) => {
                        if let Some(Value::Array(items)) = inner.get("details") {
                            entries.extend(items);
                        }
                    }
                    _ => {}
                }
            }
            entries
        }
        _ => Vec::new(),
    }
}

fn has_type_suffix(entry: &Value, suffix: &str) -> bool {
    entry
        .get("@type")
        .and_then(Value::as_str)
        .is_some_and(|t| t.ends_with(suffix))
}

fn help_urls(entry: &Value) -> Vec<String> {
    entry
        .get("links")
        .and_then(Value::as_array)
        .map(|links| {
            links
                .iter()
                .filter_map(|link| link.get("url").and_then(Value::as_str))
                .filter(|url| !url.trim().is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Whole seconds to wait, rounded up and at least 1. `None` when the delay
/// is missing, malformed or not positive.
fn parse_retry_delay(delay: &Value) -> Option<u64> {
    let seconds = match delay {
        Value::Object(pair) => {
            // A malformed half counts as zero.
            let whole = pair.get("seconds").and_then(numeric).unwrap_or(0.0);
            let nanos = pair.get("nanos").and_then(numeric).unwrap_or(0.0);
            whole + nanos / 1_000_000_000.0
        }
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().strip_suffix('s')?.trim().parse::<f64>().ok()?,
        _ => return None,
    };

    if !seconds.is_finite() || seconds <= 0.0 {
        return None;
    }
    Some((seconds.ceil() as u64).max(1))
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
