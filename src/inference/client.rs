//! Gemini REST client.
//!
//! Sends `generateContent` requests and runs tool-aware chat sessions. In
//! execution mode the session performs automatic function calling: proposed
//! calls are executed against the session's tool source and their results
//! fed back until the model answers without calling tools.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde_json::Value;

use super::config::ModelConfig;
use super::errors::{ClientError, InferenceError};
use super::protocol::{
    parse_generate_response, tool_declarations, Content, FunctionCall, GenerateContentRequest,
    GenerateContentResponse, GenerationConfig, WirePart,
};
use super::provider::{ChatSession, LlmProvider};
use super::types::{Candidate, ChatConfig, Part, RawModelResponse};
use crate::mcp_client::ToolSource;
use crate::normalize::{to_jsonable, Payload};

// ─── Constants ───────────────────────────────────────────────────────────────

/// TCP connection timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Header carrying the API key.
const API_KEY_HEADER: &str = "x-goog-api-key";

// ─── GeminiClient ────────────────────────────────────────────────────────────

/// Client for the Gemini API. Built once at startup and shared.
pub struct GeminiClient {
    http: HttpClient,
    config: ModelConfig,
}

impl GeminiClient {
    /// Create a client. Does NOT check connectivity or the API key; a
    /// missing key only produces a warning here and a 4xx on first use.
    pub fn from_config(config: ModelConfig) -> Result<Self, InferenceError> {
        config.validate()?;

        if config.api_key.as_deref().map_or(true, str::is_empty) {
            tracing::warn!("GEMINI_API_KEY is not set; Gemini requests will be rejected");
        }

        let http = HttpClient::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| InferenceError::ConnectionFailed {
                endpoint: config.base_url.clone(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    async fn generate(
        &self,
        request: &GenerateContentRequest<'_>,
    ) -> Result<GenerateContentResponse, InferenceError> {
        let url = self.config.generate_url();

        // Log the request metadata (not the full body, it can be huge)
        tracing::info!(
            url = %url,
            model = %self.config.model,
            content_count = request.contents.len(),
            tool_count = request.tools.first().map_or(0, |t| t.function_declarations.len()),
            temperature = request.generation_config.temperature,
            "=== LLM REQUEST ==="
        );

        let mut builder = self.http.post(&url).json(request);
        if let Some(key) = self.config.api_key.as_deref().filter(|k| !k.is_empty()) {
            builder = builder.header(API_KEY_HEADER, key);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                InferenceError::Timeout {
                    duration_secs: self.config.request_timeout_secs,
                }
            } else {
                InferenceError::ConnectionFailed {
                    endpoint: url.clone(),
                    reason: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| InferenceError::InvalidResponse {
                reason: format!("failed to read response body: {e}"),
            })?;

        if status.is_client_error() {
            return Err(InferenceError::Client(ClientError::from_response(
                status.as_u16(),
                &body,
            )));
        }
        if !status.is_success() {
            return Err(InferenceError::Server {
                status: status.as_u16(),
                body,
            });
        }

        parse_generate_response(&body)
    }
}

impl LlmProvider for GeminiClient {
    fn start_chat<'a>(
        &'a self,
        config: ChatConfig,
        tools: &'a dyn ToolSource,
    ) -> Box<dyn ChatSession + 'a> {
        Box::new(GeminiChat {
            client: self,
            config,
            tools,
            history: Vec::new(),
        })
    }
}

// ─── GeminiChat ──────────────────────────────────────────────────────────────

/// A chat session. Holds the full turn history for its lifetime.
pub struct GeminiChat<'a> {
    client: &'a GeminiClient,
    config: ChatConfig,
    tools: &'a dyn ToolSource,
    history: Vec<Content>,
}

impl GeminiChat<'_> {
    fn request(&self) -> GenerateContentRequest<'_> {
        GenerateContentRequest {
            contents: &self.history,
            system_instruction: Some(Content::instruction(&self.config.system_instruction)),
            tools: tool_declarations(self.tools.tools()),
            generation_config: GenerationConfig {
                temperature: self.config.temperature,
            },
        }
    }

    /// Execute one proposed call. Never fails: errors become the reply payload.
    async fn run_tool(&self, call: &FunctionCall) -> Payload {
        let arguments = Value::Object(call.args.clone().unwrap_or_default());
        match self.tools.call_tool(&call.name, arguments).await {
            Ok(result) if result.is_error => {
                Payload::Map(vec![("error".into(), Payload::object(result))])
            }
            Ok(result) => Payload::Map(vec![("result".into(), Payload::object(result))]),
            Err(e) => {
                tracing::warn!(tool = %call.name, error = %e, "automatic tool call failed");
                Payload::Map(vec![("error".into(), Payload::from(e.to_string()))])
            }
        }
    }
}

#[async_trait]
impl ChatSession for GeminiChat<'_> {
    async fn send(&mut self, text: &str) -> Result<RawModelResponse, InferenceError> {
        self.history.push(Content::user_text(text));
        let mut response = self.client.generate(&self.request()).await?;

        let mut executed: Vec<Part> = Vec::new();
        if self.config.automatic_function_calling {
            let max_rounds = self.client.config.max_remote_calls;
            let mut rounds = 0;
            loop {
                let calls = response.function_calls();
                if calls.is_empty() {
                    break;
                }
                if rounds >= max_rounds {
                    tracing::warn!(max_rounds, "automatic function calling limit reached");
                    break;
                }
                rounds += 1;

                let mut replies = Vec::with_capacity(calls.len());
                for call in &calls {
                    tracing::info!(tool = %call.name, round = rounds, "executing tool call");
                    executed.push(Part::ToolCall {
                        name: call.name.clone(),
                        arguments: call.args.clone(),
                    });
                    let payload = self.run_tool(call).await;
                    replies.push(WirePart::function_response(call, to_jsonable(&payload)));
                    executed.push(Part::ToolResult {
                        name: call.name.clone(),
                        payload,
                    });
                }

                if let Some(turn) = response.model_turn() {
                    self.history.push(turn);
                }
                self.history.push(Content::user_parts(replies));
                response = self.client.generate(&self.request()).await?;
            }
        }

        if let Some(turn) = response.model_turn() {
            self.history.push(turn);
        }

        let mut raw = response.into_raw();
        if !executed.is_empty() {
            match raw.candidates.first_mut() {
                Some(candidate) => {
                    executed.append(&mut candidate.parts);
                    candidate.parts = executed;
                }
                None => raw.candidates.push(Candidate { parts: executed }),
            }
        }
        Ok(raw)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::{Json, Router};
    use serde_json::json;

    use crate::mcp_client::{CallToolResult, McpError, McpToolDefinition};

    /// In-process stand-in for the Gemini endpoint.
    #[derive(Clone, Default)]
    struct FakeGemini {
        replies: Arc<Mutex<VecDeque<(StatusCode, Value)>>>,
        requests: Arc<Mutex<Vec<Value>>>,
    }

    async fn fake_generate(
        State(state): State<FakeGemini>,
        Json(body): Json<Value>,
    ) -> (StatusCode, Json<Value>) {
        state.requests.lock().unwrap().push(body);
        let (status, reply) = state
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or((StatusCode::OK, json!({"candidates": []})));
        (status, Json(reply))
    }

    async fn start_fake(replies: Vec<(StatusCode, Value)>) -> (GeminiClient, FakeGemini) {
        let state = FakeGemini::default();
        state.replies.lock().unwrap().extend(replies);
        let app = Router::new()
            .fallback(fake_generate)
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let client = GeminiClient::from_config(ModelConfig {
            api_key: Some("test-key".into()),
            base_url: format!("http://{addr}/v1beta"),
            ..ModelConfig::default()
        })
        .unwrap();
        (client, state)
    }

    struct FakeTools {
        tools: Vec<McpToolDefinition>,
    }

    impl FakeTools {
        fn new() -> Self {
            Self {
                tools: vec![McpToolDefinition {
                    name: "remind".into(),
                    description: "Set a reminder".into(),
                    input_schema: json!({"type": "object"}),
                }],
            }
        }
    }

    #[async_trait]
    impl ToolSource for FakeTools {
        fn tools(&self) -> &[McpToolDefinition] {
            &self.tools
        }

        async fn call_tool(&self, name: &str, arguments: Value) -> Result<CallToolResult, McpError> {
            Ok(CallToolResult {
                content: vec![json!({"type": "text", "text": format!("{name} set for {}", arguments["when"])})],
                structured_content: None,
                is_error: false,
            })
        }
    }

    fn call_reply() -> Value {
        json!({"candidates": [{"content": {"role": "model", "parts": [
            {"functionCall": {"name": "remind", "args": {"when": "tomorrow"}}}
        ]}}]})
    }

    fn text_reply(text: &str) -> Value {
        json!({"candidates": [{"content": {"role": "model", "parts": [{"text": text}]}}]})
    }

    fn chat_config(afc: bool) -> ChatConfig {
        ChatConfig {
            system_instruction: "be helpful".into(),
            temperature: 0.3,
            automatic_function_calling: afc,
        }
    }

    #[tokio::test]
    async fn test_planning_send_returns_proposed_call_without_executing() {
        let (client, fake) = start_fake(vec![(StatusCode::OK, call_reply())]).await;
        let tools = FakeTools::new();
        let mut chat = client.start_chat(chat_config(false), &tools);

        let raw = chat.send("schedule a followup").await.unwrap();
        assert_eq!(raw.parts().len(), 1);
        assert!(matches!(&raw.parts()[0], Part::ToolCall { name, .. } if name == "remind"));

        let requests = fake.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(
            requests[0]["tools"][0]["functionDeclarations"][0]["name"],
            "remind"
        );
        assert_eq!(requests[0]["systemInstruction"]["parts"][0]["text"], "be helpful");
    }

    #[tokio::test]
    async fn test_history_accumulates_across_sends() {
        let (client, fake) = start_fake(vec![
            (StatusCode::OK, text_reply("hello")),
            (StatusCode::OK, text_reply("again")),
        ])
        .await;
        let tools = FakeTools::new();
        let mut chat = client.start_chat(chat_config(false), &tools);

        chat.send("first").await.unwrap();
        chat.send("second").await.unwrap();

        let requests = fake.requests.lock().unwrap();
        let contents = requests[1]["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[0]["parts"][0]["text"], "first");
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(contents[2]["parts"][0]["text"], "second");
    }

    #[tokio::test]
    async fn test_automatic_function_calling_interleaves_calls_and_results() {
        let (client, fake) = start_fake(vec![
            (StatusCode::OK, call_reply()),
            (StatusCode::OK, text_reply("Reminder set.")),
        ])
        .await;
        let tools = FakeTools::new();
        let mut chat = client.start_chat(chat_config(true), &tools);

        let raw = chat.send("schedule a followup").await.unwrap();
        let parts = raw.parts();
        assert_eq!(parts.len(), 3);
        assert!(matches!(&parts[0], Part::ToolCall { name, .. } if name == "remind"));
        assert!(matches!(&parts[1], Part::ToolResult { name, .. } if name == "remind"));
        assert_eq!(raw.text().as_deref(), Some("Reminder set."));

        let requests = fake.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        let reply = &requests[1]["contents"][2]["parts"][0]["functionResponse"];
        assert_eq!(reply["name"], "remind");
        assert_eq!(
            reply["response"]["result"]["content"][0]["text"],
            "remind set for \"tomorrow\""
        );
    }

    #[tokio::test]
    async fn test_automatic_function_calling_respects_round_limit() {
        let replies = (0..5).map(|_| (StatusCode::OK, call_reply())).collect();
        let (mut client, fake) = start_fake(replies).await;
        client.config.max_remote_calls = 2;
        let tools = FakeTools::new();
        let mut chat = client.start_chat(chat_config(true), &tools);

        let raw = chat.send("loop forever").await.unwrap();
        assert_eq!(fake.requests.lock().unwrap().len(), 3);
        // Two executed rounds (call + result each) plus the final unexecuted call.
        assert_eq!(raw.parts().len(), 5);
    }

    #[tokio::test]
    async fn test_quota_rejection_becomes_client_error() {
        let body = json!({"error": {
            "code": 429,
            "message": "Resource has been exhausted",
            "status": "RESOURCE_EXHAUSTED"
        }});
        let (client, _) = start_fake(vec![(StatusCode::TOO_MANY_REQUESTS, body)]).await;
        let tools = FakeTools::new();
        let mut chat = client.start_chat(chat_config(false), &tools);

        let err = chat.send("hi").await.unwrap_err();
        let client_err = err.client_error().expect("expected client error");
        assert_eq!(client_err.code, 429);
        assert_eq!(client_err.status.as_deref(), Some("RESOURCE_EXHAUSTED"));
    }

    #[tokio::test]
    async fn test_server_failure_becomes_server_error() {
        let (client, _) =
            start_fake(vec![(StatusCode::INTERNAL_SERVER_ERROR, json!({"error": "boom"}))]).await;
        let tools = FakeTools::new();
        let mut chat = client.start_chat(chat_config(false), &tools);

        let err = chat.send("hi").await.unwrap_err();
        assert!(matches!(err, InferenceError::Server { status: 500, .. }));
    }
}
