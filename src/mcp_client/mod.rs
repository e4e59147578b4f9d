//! MCP Client: JSON-RPC access to the tool server.
//!
//! This module handles:
//! - Streamable-HTTP and stdio JSON-RPC transports
//! - The `initialize` / `tools/list` / `tools/call` protocol flow
//! - Scoped connections that are always released, even when dropped
//!
//! The agent core only sees the [`ToolConnector`] / [`ToolSource`] seams;
//! the model provider drives tool calls through them.

pub mod client;
pub mod errors;
pub mod transport;
pub mod types;

// Re-exports for convenience
pub use client::{McpConnection, McpConnector, ToolConnection, ToolConnector, ToolSource};
pub use errors::McpError;
pub use types::{CallToolResult, McpToolDefinition, ToolServerConfig};
