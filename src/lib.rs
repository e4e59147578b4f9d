//! fuse-agent: a plan / confirm / execute chat backend.
//!
//! Modules:
//! - `agent_core`: Planning and execution flows, tool-call ledger, quota translation
//! - `inference`: Gemini client with automatic function calling
//! - `mcp_client`: MCP tool-server connections over HTTP or stdio
//! - `normalize`: Conversion of tool results into JSON-friendly values
//! - `config`: YAML + environment configuration
//! - `logging`: Tracing subscriber setup
//! - `server`: axum HTTP surface

pub mod agent_core;
pub mod config;
pub mod inference;
pub mod logging;
pub mod mcp_client;
pub mod normalize;
pub mod server;

use std::sync::Arc;

use anyhow::Context;

use agent_core::{ChatService, SessionSettings};
use inference::GeminiClient;
use mcp_client::McpConnector;

/// Load configuration, install logging, and serve HTTP until Ctrl-C.
pub async fn run() -> anyhow::Result<()> {
    let config = config::load().context("failed to load configuration")?;
    logging::init_tracing(&config.logging)?;

    tracing::info!(
        model = %config.gemini.model,
        tool_server = %config.tools.server.label(),
        "configuration loaded"
    );

    let settings = SessionSettings::from(&config.gemini);
    let provider = GeminiClient::from_config(config.gemini.clone())
        .context("failed to build Gemini client")?;
    let connector = McpConnector::new(config.tools.server.clone(), config.tools.call_timeout());

    let chat = ChatService::new(Arc::new(provider), Arc::new(connector), settings);
    server::serve(&config.server, chat).await
}
