//! MCP connections and the tool-source seams used by the agent core.
//!
//! A [`McpConnection`] is one initialized session with the tool server: it
//! performs the `initialize` handshake, caches the `tools/list` result and
//! routes `tools/call` requests. The agent never holds a connection across
//! requests; a [`ToolConnector`] opens a fresh one per exchange.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::errors::McpError;
use super::transport::{extract_result, HttpTransport, StdioTransport, Transport};
use super::types::{
    CallToolResult, InitializeResult, ListToolsResult, McpToolDefinition, ToolServerConfig,
    PROTOCOL_VERSION,
};

// ─── Constants ───────────────────────────────────────────────────────────────

/// Bound on the whole initialize + tools/list handshake.
const INIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default bound on a single tool call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(60);

// ─── Seams ───────────────────────────────────────────────────────────────────

/// Something that exposes callable tools.
#[async_trait]
pub trait ToolSource: Send + Sync {
    /// Tools advertised by the server.
    fn tools(&self) -> &[McpToolDefinition];

    /// Invoke a tool by name.
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<CallToolResult, McpError>;
}

/// An open, scoped tool connection.
#[async_trait]
pub trait ToolConnection: ToolSource {
    /// View this connection as a plain tool source.
    fn as_source(&self) -> &dyn ToolSource;

    /// Release the connection. Safe to call more than once.
    async fn close(&mut self);
}

/// Opens tool connections.
#[async_trait]
pub trait ToolConnector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn ToolConnection>, McpError>;
}

// ─── McpConnection ───────────────────────────────────────────────────────────

/// An initialized MCP session.
pub struct McpConnection {
    server: String,
    transport: Box<dyn Transport>,
    tools: Vec<McpToolDefinition>,
    call_timeout: Duration,
    closed: bool,
}

impl McpConnection {
    /// Connect to the configured server and complete the handshake.
    pub async fn open(config: &ToolServerConfig, call_timeout: Duration) -> Result<Self, McpError> {
        let transport: Box<dyn Transport> = match config {
            ToolServerConfig::Http { url } => Box::new(HttpTransport::new(url)?),
            ToolServerConfig::Stdio {
                command,
                args,
                env,
                cwd,
            } => Box::new(StdioTransport::spawn(command, args, env, cwd.as_deref())?),
        };

        let mut connection = Self {
            server: config.label().to_string(),
            transport,
            tools: Vec::new(),
            call_timeout,
            closed: false,
        };

        let handshake = tokio::time::timeout(INIT_TIMEOUT, connection.initialize()).await;
        let failure = match handshake {
            Ok(Ok(())) => return Ok(connection),
            Ok(Err(e)) => McpError::InitFailed {
                name: connection.server.clone(),
                reason: e.to_string(),
            },
            Err(_) => McpError::Timeout {
                operation: "initialize".into(),
                timeout_ms: INIT_TIMEOUT.as_millis() as u64,
            },
        };

        connection.close().await;
        Err(failure)
    }

    async fn initialize(&mut self) -> Result<(), McpError> {
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
            },
        });
        let result = extract_result(self.transport.request("initialize", Some(params)).await?)?;
        let init: InitializeResult =
            serde_json::from_value(result).map_err(|e| McpError::InitFailed {
                name: self.server.clone(),
                reason: format!("invalid initialize result: {e}"),
            })?;

        self.transport
            .notify("notifications/initialized", None)
            .await?;

        let listed = extract_result(self.transport.request("tools/list", None).await?)?;
        let listed: ListToolsResult =
            serde_json::from_value(listed).map_err(|e| McpError::InitFailed {
                name: self.server.clone(),
                reason: format!("invalid tools/list result: {e}"),
            })?;
        self.tools = listed.tools;

        let server_info = init.server_info.as_ref();
        tracing::info!(
            server = %self.server,
            server_name = ?server_info.and_then(|s| s.name.as_deref()),
            server_version = ?server_info.and_then(|s| s.version.as_deref()),
            protocol = ?init.protocol_version,
            tool_count = self.tools.len(),
            "MCP session initialized"
        );
        Ok(())
    }
}

#[async_trait]
impl ToolSource for McpConnection {
    fn tools(&self) -> &[McpToolDefinition] {
        &self.tools
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<CallToolResult, McpError> {
        if self.closed {
            return Err(McpError::Closed {
                server: self.server.clone(),
            });
        }

        let params = json!({ "name": name, "arguments": arguments });
        let started = std::time::Instant::now();
        let response = tokio::time::timeout(
            self.call_timeout,
            self.transport.request("tools/call", Some(params)),
        )
        .await
        .map_err(|_| McpError::Timeout {
            operation: format!("tools/call {name}"),
            timeout_ms: self.call_timeout.as_millis() as u64,
        })??;

        let result: CallToolResult = serde_json::from_value(extract_result(response)?)
            .map_err(|e| McpError::TransportError {
                server: self.server.clone(),
                reason: format!("invalid tools/call result: {e}"),
            })?;

        tracing::info!(
            tool = %name,
            is_error = result.is_error,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "tool call finished"
        );
        Ok(result)
    }
}

#[async_trait]
impl ToolConnection for McpConnection {
    fn as_source(&self) -> &dyn ToolSource {
        self
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.transport.close().await {
            tracing::warn!(server = %self.server, error = %e, "failed to close MCP session");
        }
    }
}

impl Drop for McpConnection {
    fn drop(&mut self) {
        if !self.closed {
            // The transport's own drop releases the session or process.
            tracing::debug!(server = %self.server, "MCP connection dropped without close");
        }
    }
}

// ─── McpConnector ────────────────────────────────────────────────────────────

/// Opens a fresh [`McpConnection`] per call.
#[derive(Debug, Clone)]
pub struct McpConnector {
    config: ToolServerConfig,
    call_timeout: Duration,
}

impl McpConnector {
    pub fn new(config: ToolServerConfig, call_timeout: Duration) -> Self {
        Self {
            config,
            call_timeout,
        }
    }
}

#[async_trait]
impl ToolConnector for McpConnector {
    async fn connect(&self) -> Result<Box<dyn ToolConnection>, McpError> {
        let connection = McpConnection::open(&self.config, self.call_timeout).await?;
        Ok(Box::new(connection))
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
