//! JSON-RPC transports for MCP tool servers.
//!
//! Two transports implement [`Transport`]:
//! - [`HttpTransport`]: streamable HTTP. Each request is a POST whose reply
//!   is either a JSON body or an SSE body carrying the JSON-RPC response.
//! - [`StdioTransport`]: line-delimited JSON over a child process's stdio.
//!
//! Both release their server-side resources on `close()`, and again (best
//! effort) on drop, so a cancelled request never leaks a session or process.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;

use super::errors::McpError;
use super::types::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, INTERNAL_ERROR};

// ─── Request ID Generator ────────────────────────────────────────────────────

/// Global monotonic request ID counter.
static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// Generate a unique request ID.
pub fn next_request_id() -> u64 {
    NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed)
}

// ─── Transport Trait ─────────────────────────────────────────────────────────

/// A bidirectional JSON-RPC channel to one tool server.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request and wait for the response with the matching id.
    async fn request(&self, method: &str, params: Option<Value>)
        -> Result<JsonRpcResponse, McpError>;

    /// Send a notification (no response expected).
    async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), McpError>;

    /// Release the server-side session or process. Idempotent.
    async fn close(&self) -> Result<(), McpError>;
}

// ─── HTTP ────────────────────────────────────────────────────────────────────

/// Header carrying the server-assigned session id.
const SESSION_HEADER: &str = "mcp-session-id";

/// Header carrying the negotiated protocol revision.
const PROTOCOL_HEADER: &str = "mcp-protocol-version";

/// TCP connection timeout for the tool server.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Streamable-HTTP transport.
pub struct HttpTransport {
    url: String,
    http: reqwest::Client,
    session_id: std::sync::Mutex<Option<String>>,
    closed: AtomicBool,
}

impl HttpTransport {
    /// Create a transport for `url`. No request is made until the first call.
    pub fn new(url: &str) -> Result<Self, McpError> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| McpError::TransportError {
                server: url.to_string(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            url: url.to_string(),
            http,
            session_id: std::sync::Mutex::new(None),
            closed: AtomicBool::new(false),
        })
    }

    fn session_id(&self) -> Option<String> {
        self.session_id.lock().ok().and_then(|guard| guard.clone())
    }

    fn set_session_id(&self, id: &str) {
        if let Ok(mut guard) = self.session_id.lock() {
            *guard = Some(id.to_string());
        }
    }

    fn transport_error(&self, reason: String) -> McpError {
        McpError::TransportError {
            server: self.url.clone(),
            reason,
        }
    }

    async fn post(&self, message: &impl Serialize) -> Result<reqwest::Response, McpError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(McpError::Closed {
                server: self.url.clone(),
            });
        }

        let mut builder = self
            .http
            .post(&self.url)
            .header(ACCEPT, "application/json, text/event-stream")
            .json(message);
        if let Some(id) = self.session_id() {
            builder = builder
                .header(SESSION_HEADER, id)
                .header(PROTOCOL_HEADER, super::types::PROTOCOL_VERSION);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| self.transport_error(format!("POST failed: {e}")))?;

        if let Some(id) = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            self.set_session_id(id);
        }

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(self.transport_error(format!("HTTP {}: {body}", status.as_u16())));
        }

        Ok(response)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Result<JsonRpcResponse, McpError> {
        let id = next_request_id();
        let req = JsonRpcRequest::new(id, method, params);
        let response = self.post(&req).await?;

        let is_event_stream = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("text/event-stream"));

        let body = response
            .text()
            .await
            .map_err(|e| self.transport_error(format!("failed to read response body: {e}")))?;

        let found = if is_event_stream {
            parse_sse_messages(&body)
                .iter()
                .find_map(|data| parse_response_for(data, id))
        } else {
            parse_response_for(&body, id)
        };

        found.ok_or_else(|| {
            self.transport_error(format!("no JSON-RPC response for request {id} ({method})"))
        })
    }

    async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), McpError> {
        self.post(&JsonRpcNotification::new(method, params)).await?;
        Ok(())
    }

    async fn close(&self) -> Result<(), McpError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let Some(id) = self.session_id() else {
            return Ok(());
        };

        let response = self
            .http
            .delete(&self.url)
            .header(SESSION_HEADER, id)
            .send()
            .await
            .map_err(|e| self.transport_error(format!("DELETE failed: {e}")))?;

        // 405 means the server does not support explicit session termination.
        let status = response.status();
        if !status.is_success() && status.as_u16() != 405 {
            return Err(self.transport_error(format!("DELETE returned HTTP {}", status.as_u16())));
        }
        Ok(())
    }
}

impl Drop for HttpTransport {
    fn drop(&mut self) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        let Some(id) = self.session_id() else {
            return;
        };
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };

        tracing::debug!(server = %self.url, "releasing unclosed MCP HTTP session");
        let http = self.http.clone();
        let url = self.url.clone();
        handle.spawn(async move {
            let _ = http.delete(&url).header(SESSION_HEADER, id).send().await;
        });
    }
}

/// Split an SSE body into the data payloads of its events.
///
/// Multi-line `data:` fields of one event are joined with `\n`. Other
/// fields (`event:`, `id:`, comments) are ignored.
pub fn parse_sse_messages(body: &str) -> Vec<String> {
    let mut messages = Vec::new();
    let mut data: Vec<&str> = Vec::new();

    for line in body.lines() {
        if line.is_empty() {
            if !data.is_empty() {
                messages.push(data.join("\n"));
                data.clear();
            }
            continue;
        }
        if let Some(rest) = line.strip_prefix("data:") {
            data.push(rest.strip_prefix(' ').unwrap_or(rest));
        }
    }
    if !data.is_empty() {
        messages.push(data.join("\n"));
    }

    messages
}

fn parse_response_for(raw: &str, id: u64) -> Option<JsonRpcResponse> {
    serde_json::from_str::<JsonRpcResponse>(raw.trim())
        .ok()
        .filter(|resp| resp.id == id)
}

// ─── Stdio ───────────────────────────────────────────────────────────────────

/// Grace period for the child to exit after stdin is closed.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Bi-directional JSON-RPC transport over a child process's stdio.
pub struct StdioTransport {
    server_name: String,
    child: Mutex<Child>,
    writer: Mutex<Option<ChildStdin>>,
    reader: Mutex<BufReader<ChildStdout>>,
    closed: AtomicBool,
}

impl StdioTransport {
    /// Spawn the tool server process. The child is killed if the transport
    /// is dropped without `close()`.
    pub fn spawn(
        command: &str,
        args: &[String],
        env: &HashMap<String, String>,
        cwd: Option<&str>,
    ) -> Result<Self, McpError> {
        let mut cmd = Command::new(command);
        cmd.args(args)
            .envs(env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|e| McpError::SpawnFailed {
            name: command.to_string(),
            reason: e.to_string(),
        })?;

        let stdin = child.stdin.take().ok_or_else(|| McpError::SpawnFailed {
            name: command.to_string(),
            reason: "stdin was not captured".into(),
        })?;
        let stdout = child.stdout.take().ok_or_else(|| McpError::SpawnFailed {
            name: command.to_string(),
            reason: "stdout was not captured".into(),
        })?;

        tracing::info!(server = %command, pid = ?child.id(), "spawned MCP server process");

        Ok(Self {
            server_name: command.to_string(),
            child: Mutex::new(child),
            writer: Mutex::new(Some(stdin)),
            reader: Mutex::new(BufReader::new(stdout)),
            closed: AtomicBool::new(false),
        })
    }

    fn transport_error(&self, reason: String) -> McpError {
        McpError::TransportError {
            server: self.server_name.clone(),
            reason,
        }
    }

    async fn write_line(&self, message: &impl Serialize) -> Result<(), McpError> {
        let mut json = serde_json::to_string(message)
            .map_err(|e| self.transport_error(format!("failed to serialize message: {e}")))?;
        json.push('\n');

        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or_else(|| McpError::Closed {
            server: self.server_name.clone(),
        })?;
        writer
            .write_all(json.as_bytes())
            .await
            .map_err(|e| self.transport_error(format!("failed to write to stdin: {e}")))?;
        writer
            .flush()
            .await
            .map_err(|e| self.transport_error(format!("failed to flush stdin: {e}")))
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn request(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Result<JsonRpcResponse, McpError> {
        let id = next_request_id();
        self.write_line(&JsonRpcRequest::new(id, method, params))
            .await?;

        let mut line_buf = String::new();
        let mut reader = self.reader.lock().await;

        loop {
            line_buf.clear();
            let bytes_read = reader
                .read_line(&mut line_buf)
                .await
                .map_err(|e| self.transport_error(format!("failed to read from stdout: {e}")))?;

            if bytes_read == 0 {
                return Err(self.transport_error(
                    "server stdout closed (process may have exited)".into(),
                ));
            }

            // Log output, notifications and stale responses are skipped.
            if let Some(resp) = parse_response_for(&line_buf, id) {
                return Ok(resp);
            }
        }
    }

    async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), McpError> {
        self.write_line(&JsonRpcNotification::new(method, params))
            .await
    }

    async fn close(&self) -> Result<(), McpError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        // Closing stdin is the stdio transport's shutdown signal.
        drop(self.writer.lock().await.take());

        let mut child = self.child.lock().await;
        match tokio::time::timeout(SHUTDOWN_TIMEOUT, child.wait()).await {
            Ok(Ok(status)) => {
                tracing::debug!(server = %self.server_name, %status, "MCP server exited");
            }
            _ => {
                tracing::warn!(
                    server = %self.server_name,
                    "MCP server did not exit after stdin closed, killing"
                );
                let _ = child.kill().await;
            }
        }
        Ok(())
    }
}

// ─── Response Helpers ────────────────────────────────────────────────────────

/// Extract the result from a JSON-RPC response, converting errors to `McpError`.
pub fn extract_result(response: JsonRpcResponse) -> Result<Value, McpError> {
    if let Some(err) = response.error {
        return Err(McpError::ServerError {
            code: err.code,
            message: err.message,
            data: err.data,
        });
    }

    response.result.ok_or(McpError::ServerError {
        code: INTERNAL_ERROR,
        message: "response missing both result and error".into(),
        data: None,
    })
}

// ─── Tests ───────────────────────────────────────────────────────────────────
