//! In-memory provider and tool connector for agent-core tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::inference::{ChatConfig, ChatSession, InferenceError, LlmProvider, Part, RawModelResponse};
use crate::mcp_client::{
    CallToolResult, McpError, McpToolDefinition, ToolConnection, ToolConnector, ToolSource,
};
use crate::normalize::Payload;

// ─── Provider ────────────────────────────────────────────────────────────────

/// Replies to each `send` with the next scripted response.
///
/// With automatic function calling on, every tool-call part of a reply is
/// executed against the session's tool source and followed by its result,
/// the way the real provider reports executed calls.
#[derive(Default)]
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Result<RawModelResponse, InferenceError>>>,
    pub sent: Mutex<Vec<String>>,
    pub configs: Mutex<Vec<ChatConfig>>,
    /// Never answer; used to simulate cancellation.
    pub hang: bool,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<Result<RawModelResponse, InferenceError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            ..Self::default()
        }
    }

    pub fn hanging() -> Self {
        Self {
            hang: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

impl LlmProvider for ScriptedProvider {
    fn start_chat<'a>(
        &'a self,
        config: ChatConfig,
        tools: &'a dyn ToolSource,
    ) -> Box<dyn ChatSession + 'a> {
        self.configs.lock().unwrap().push(config.clone());
        Box::new(ScriptedChat {
            provider: self,
            config,
            tools,
        })
    }
}

struct ScriptedChat<'a> {
    provider: &'a ScriptedProvider,
    config: ChatConfig,
    tools: &'a dyn ToolSource,
}

#[async_trait]
impl ChatSession for ScriptedChat<'_> {
    async fn send(&mut self, text: &str) -> Result<RawModelResponse, InferenceError> {
        self.provider.sent.lock().unwrap().push(text.to_string());
        if self.provider.hang {
            std::future::pending::<()>().await;
        }

        let reply = self
            .provider
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(RawModelResponse::default()))?;

        if !self.config.automatic_function_calling {
            return Ok(reply);
        }

        let mut parts = Vec::new();
        for part in reply.parts().iter().cloned() {
            if let Part::ToolCall { name, arguments } = &part {
                let args = Value::Object(arguments.clone().unwrap_or_default());
                let outcome = self.tools.call_tool(name, args).await;
                let payload = match outcome {
                    Ok(result) => Payload::Map(vec![("result".into(), Payload::object(result))]),
                    Err(e) => Payload::Map(vec![("error".into(), Payload::from(e.to_string()))]),
                };
                let name = name.clone();
                parts.push(part);
                parts.push(Part::ToolResult { name, payload });
            } else {
                parts.push(part);
            }
        }
        Ok(RawModelResponse::from_parts(parts))
    }
}

// ─── Tool Connector ──────────────────────────────────────────────────────────

/// Counts connection opens, closes and drops.
#[derive(Default)]
pub struct FakeConnector {
    pub opens: AtomicUsize,
    pub closes: Arc<AtomicUsize>,
    pub drops: Arc<AtomicUsize>,
    pub fail: bool,
}

impl FakeConnector {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn drops(&self) -> usize {
        self.drops.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ToolConnector for FakeConnector {
    async fn connect(&self) -> Result<Box<dyn ToolConnection>, McpError> {
        if self.fail {
            return Err(McpError::TransportError {
                server: "http://localhost:8000/mcp".into(),
                reason: "connection refused".into(),
            });
        }
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeConnection {
            tools: vec![McpToolDefinition {
                name: "remind".into(),
                description: "Set a reminder".into(),
                input_schema: json!({"type": "object"}),
            }],
            closes: self.closes.clone(),
            drops: self.drops.clone(),
        }))
    }
}

struct FakeConnection {
    tools: Vec<McpToolDefinition>,
    closes: Arc<AtomicUsize>,
    drops: Arc<AtomicUsize>,
}

#[async_trait]
impl ToolSource for FakeConnection {
    fn tools(&self) -> &[McpToolDefinition] {
        &self.tools
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<CallToolResult, McpError> {
        Ok(CallToolResult {
            content: vec![json!({"type": "text", "text": format!("{name} ok")})],
            structured_content: Some(arguments),
            is_error: false,
        })
    }
}

#[async_trait]
impl ToolConnection for FakeConnection {
    fn as_source(&self) -> &dyn ToolSource {
        self
    }

    async fn close(&mut self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

impl Drop for FakeConnection {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}
