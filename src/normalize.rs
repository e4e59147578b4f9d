//! Value normalization for display text.
//!
//! Tool results and tool arguments arrive as arbitrary values: plain JSON,
//! typed protocol records, or opaque objects. Two total operations turn them
//! into something a chat response can carry:
//!
//! - [`to_jsonable`] produces a JSON-safe [`serde_json::Value`]
//! - [`stringify`] produces human-readable text
//!
//! Neither operation fails. Each object strategy that errors falls through
//! to the next one, and the last strategy (the display form) always works.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Number, Value};

// ─── Payload ─────────────────────────────────────────────────────────────────

/// A value the normalizer knows how to render.
#[derive(Debug, Clone)]
pub enum Payload {
    Null,
    Bool(bool),
    Number(Number),
    /// Raw float, possibly non-finite (and therefore not JSON-representable).
    Float(f64),
    String(String),
    List(Vec<Payload>),
    Map(Vec<(String, Payload)>),
    Object(Arc<dyn PayloadObject>),
}

impl Payload {
    /// Wrap an object-like value.
    pub fn object(value: impl PayloadObject + 'static) -> Self {
        Payload::Object(Arc::new(value))
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Payload::Null,
            Value::Bool(b) => Payload::Bool(b),
            Value::Number(n) => Payload::Number(n),
            Value::String(s) => Payload::String(s),
            Value::Array(items) => Payload::List(items.into_iter().map(Payload::from).collect()),
            Value::Object(map) => {
                Payload::Map(map.into_iter().map(|(k, v)| (k, Payload::from(v))).collect())
            }
        }
    }
}

impl From<&Value> for Payload {
    fn from(value: &Value) -> Self {
        Payload::from(value.clone())
    }
}

impl From<&str> for Payload {
    fn from(value: &str) -> Self {
        Payload::String(value.to_string())
    }
}

impl From<String> for Payload {
    fn from(value: String) -> Self {
        Payload::String(value)
    }
}

impl From<f64> for Payload {
    fn from(value: f64) -> Self {
        Payload::Float(value)
    }
}

// ─── Object Capabilities ─────────────────────────────────────────────────────

/// Capabilities an opaque value may expose to the normalizer.
///
/// Every method defaults to "not supported". Implementors override the ones
/// that apply; `Display` is the mandatory last resort.
pub trait PayloadObject: fmt::Debug + fmt::Display + Send + Sync {
    /// A structured dump of the whole object (e.g. its serde form).
    fn structured_dump(&self) -> Option<anyhow::Result<Value>> {
        None
    }

    /// Conversion to a key/value mapping.
    fn to_dict(&self) -> Option<anyhow::Result<Vec<(String, Payload)>>> {
        None
    }

    /// Attribute listing. Names starting with `_` are treated as private
    /// and skipped by the normalizer.
    fn attributes(&self) -> Option<Vec<(String, Payload)>> {
        None
    }
}

// ─── Operations ──────────────────────────────────────────────────────────────

/// Convert a payload into a JSON-safe value.
pub fn to_jsonable(payload: &Payload) -> Value {
    match payload {
        Payload::Null => Value::Null,
        Payload::Bool(b) => Value::Bool(*b),
        Payload::Number(n) => Value::Number(n.clone()),
        Payload::Float(f) => Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(f.to_string())),
        Payload::String(s) => Value::String(s.clone()),
        Payload::List(items) => Value::Array(items.iter().map(to_jsonable).collect()),
        Payload::Map(entries) => map_to_value(entries.iter()),
        Payload::Object(object) => object_to_jsonable(object.as_ref()),
    }
}

/// Render a payload as display text.
///
/// Null becomes the empty string, mappings and sequences become
/// pretty-printed JSON, strings are returned verbatim.
pub fn stringify(payload: &Payload) -> String {
    match to_jsonable(payload) {
        Value::Null => String::new(),
        Value::String(s) => s,
        value @ (Value::Object(_) | Value::Array(_)) => {
            serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string())
        }
        other => other.to_string(),
    }
}

fn object_to_jsonable(object: &dyn PayloadObject) -> Value {
    match object.structured_dump() {
        Some(Ok(dumped)) => return to_jsonable(&Payload::from(dumped)),
        Some(Err(e)) => {
            tracing::debug!(error = %e, "structured dump failed, trying dictionary conversion");
        }
        None => {}
    }

    match object.to_dict() {
        Some(Ok(entries)) => return map_to_value(entries.iter()),
        Some(Err(e)) => {
            tracing::debug!(error = %e, "dictionary conversion failed, trying attributes");
        }
        None => {}
    }

    if let Some(attributes) = object.attributes() {
        return map_to_value(attributes.iter().filter(|(name, _)| !name.starts_with('_')));
    }

    Value::String(object.to_string())
}

fn map_to_value<'a>(entries: impl Iterator<Item = &'a (String, Payload)>) -> Value {
    let mut map = Map::new();
    for (key, value) in entries {
        map.insert(key.clone(), to_jsonable(value));
    }
    Value::Object(map)
}

// ─── Tests ───────────────────────────────────────────────────────────────────
