//! Tool-call ledger for execution-mode responses.
//!
//! The provider has already run the tools, so the response interleaves call
//! parts and result parts. Results are paired with the most recent
//! unresolved call of the same name (LIFO); a result with no open call is
//! still recorded.

use serde_json::{Map, Value};

use super::types::{ToolCall, ToolCallStatus};
use crate::inference::{Part, RawModelResponse};
use crate::normalize::{stringify, Payload};

/// Ordered tool calls of one execution turn.
#[derive(Debug, Default)]
pub struct ToolCallLedger {
    calls: Vec<ToolCall>,
}

impl ToolCallLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the ledger from a response's parts.
    pub fn from_response(response: &RawModelResponse) -> Self {
        let mut ledger = Self::new();
        for part in response.parts() {
            match part {
                Part::ToolCall { name, arguments } => ledger.record_call(name, arguments.clone()),
                Part::ToolResult { name, payload } => ledger.record_result(name, payload),
                Part::Text(_) => {}
            }
        }
        ledger
    }

    pub fn record_call(&mut self, name: &str, arguments: Option<Map<String, Value>>) {
        self.calls.push(ToolCall::called(name, arguments));
    }

    /// Complete the newest open call named `name`, or append an orphan entry.
    pub fn record_result(&mut self, name: &str, payload: &Payload) {
        let result_text = stringify(payload);
        let open = self
            .calls
            .iter_mut()
            .rev()
            .find(|call| call.name == name && call.status == ToolCallStatus::Called);

        match open {
            Some(call) => {
                call.result_text = Some(result_text);
                call.status = ToolCallStatus::Completed;
            }
            None => {
                tracing::debug!(tool = %name, "tool result without a matching call");
                self.calls.push(ToolCall::orphan_result(name, result_text));
            }
        }
    }

    pub fn calls(&self) -> &[ToolCall] {
        &self.calls
    }

    pub fn into_calls(self) -> Vec<ToolCall> {
        self.calls
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(name: &str) -> Part {
        Part::ToolCall {
            name: name.into(),
            arguments: Some(Map::new()),
        }
    }

    fn result(name: &str, value: Value) -> Part {
        Part::ToolResult {
            name: name.into(),
            payload: Payload::from(value),
        }
    }

    #[test]
    fn test_call_then_result_completes() {
        let response = RawModelResponse::from_parts(vec![
            call("remind"),
            result("remind", json!({"result": "ok"})),
            Part::Text("Done.".into()),
        ]);
        let calls = ToolCallLedger::from_response(&response).into_calls();

        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].status, ToolCallStatus::Completed);
        assert_eq!(
            calls[0].result_text.as_deref(),
            Some("{\n  \"result\": \"ok\"\n}")
        );
    }

    #[test]
    fn test_results_pair_with_most_recent_open_call() {
        let response = RawModelResponse::from_parts(vec![
            call("A"),
            call("B"),
            call("A"),
            result("A", json!("first")),
            result("A", json!("second")),
        ]);
        let calls = ToolCallLedger::from_response(&response).into_calls();

        assert_eq!(calls.len(), 3);
        assert_eq!(calls[2].result_text.as_deref(), Some("first"));
        assert_eq!(calls[0].result_text.as_deref(), Some("second"));
        assert_eq!(calls[1].status, ToolCallStatus::Called);
        assert!(calls[1].result_text.is_none());
    }

    #[test]
    fn test_orphan_result_is_appended() {
        let response = RawModelResponse::from_parts(vec![
            call("A"),
            result("A", json!("done")),
            result("A", json!("again")),
            result("Z", json!(null)),
        ]);
        let calls = ToolCallLedger::from_response(&response).into_calls();

        assert_eq!(calls.len(), 3);
        assert_eq!(calls[1].name, "A");
        assert_eq!(calls[1].status, ToolCallStatus::Completed);
        assert_eq!(calls[1].result_text.as_deref(), Some("again"));
        assert!(calls[1].arguments.is_none());
        assert_eq!(calls[2].name, "Z");
        assert_eq!(calls[2].result_text.as_deref(), Some(""));
    }

    #[test]
    fn test_empty_result_text_is_not_reopened() {
        let mut ledger = ToolCallLedger::new();
        ledger.record_call("A", None);
        ledger.record_result("A", &Payload::Null);
        ledger.record_result("A", &Payload::from("late"));

        let calls = ledger.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].result_text.as_deref(), Some(""));
        assert_eq!(calls[1].result_text.as_deref(), Some("late"));
    }

    #[test]
    fn test_no_tool_parts_gives_empty_ledger() {
        let response = RawModelResponse::from_parts(vec![Part::Text("nothing to do".into())]);
        assert!(ToolCallLedger::from_response(&response).calls().is_empty());
    }
}
