//! Application configuration loading and validation.
//!
//! Sources, lowest precedence first:
//! 1. Built-in defaults
//! 2. A YAML file (`$FUSE_AGENT_CONFIG`, else `./fuse-agent.yaml` if present),
//!    with `${VAR}` / `${VAR:-default}` interpolation
//! 3. Environment overrides (`GEMINI_API_KEY`, `GEMINI_MODEL`,
//!    `MCP_SERVER_URL`, `DEFAULT_HOST`, `DEFAULT_PORT`)
//!
//! A `.env` file in the working directory is loaded into the environment
//! first, so it feeds both interpolation and overrides.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::inference::ModelConfig;
use crate::mcp_client::client::DEFAULT_CALL_TIMEOUT;
use crate::mcp_client::ToolServerConfig;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "FUSE_AGENT_CONFIG";

/// Config file picked up from the working directory when present.
pub const DEFAULT_CONFIG_FILE: &str = "fuse-agent.yaml";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8001;

// ─── Errors ──────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("failed to parse {path}: {reason}")]
    Parse { path: String, reason: String },

    #[error("invalid configuration: {reason}")]
    Invalid { reason: String },
}

// ─── Public Types ────────────────────────────────────────────────────────────

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub gemini: ModelConfig,
    pub tools: ToolsConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

/// Where the MCP tool server lives.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ToolsConfig {
    pub server: ToolServerConfig,
    pub call_timeout_secs: u64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            server: ToolServerConfig::default(),
            call_timeout_secs: DEFAULT_CALL_TIMEOUT.as_secs(),
        }
    }
}

impl ToolsConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging settings. `RUST_LOG` overrides `filter` when set.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub filter: String,
    pub format: LogFormat,
    /// Log file path. `None` logs to stdout.
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "fuse_agent=info,tower_http=info,warn".to_string(),
            format: LogFormat::Text,
            file: None,
        }
    }
}

// ─── Loading ─────────────────────────────────────────────────────────────────

/// The config file that `load` will read, if any.
pub fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(explicit) = std::env::var(CONFIG_ENV_VAR) {
        return Some(PathBuf::from(expand_tilde(&explicit)));
    }
    let local = PathBuf::from(DEFAULT_CONFIG_FILE);
    local.exists().then_some(local)
}

/// Load the configuration from `.env`, the config file and the environment.
pub fn load() -> Result<AppConfig, ConfigError> {
    // A missing .env file is normal in production.
    let _ = dotenvy::dotenv();

    let mut config = match resolve_config_path() {
        Some(path) => load_from_path(&path)?,
        None => AppConfig::default(),
    };
    config.apply_env_overrides(|key| std::env::var(key).ok())?;
    config.validate()?;
    Ok(config)
}

/// Read and parse one YAML config file, interpolating environment variables.
pub fn load_from_path(path: &Path) -> Result<AppConfig, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    let interpolated = interpolate_env_vars(&raw);
    if interpolated.trim().is_empty() {
        return Ok(AppConfig::default());
    }

    serde_yaml::from_str(&interpolated).map_err(|e| ConfigError::Parse {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

impl AppConfig {
    /// Apply environment overrides read through `lookup`.
    pub fn apply_env_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty("GEMINI_API_KEY") {
            self.gemini.api_key = Some(key);
        }
        if let Some(model) = non_empty("GEMINI_MODEL") {
            self.gemini.model = model;
        }
        if let Some(url) = non_empty("MCP_SERVER_URL") {
            self.tools.server = ToolServerConfig::Http { url };
        }
        if let Some(host) = non_empty("DEFAULT_HOST") {
            self.server.host = host;
        }
        if let Some(port) = non_empty("DEFAULT_PORT") {
            self.server.port = port.trim().parse().map_err(|_| ConfigError::Invalid {
                reason: format!("DEFAULT_PORT is not a port number: '{port}'"),
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.gemini.validate().map_err(|e| ConfigError::Invalid {
            reason: e.to_string(),
        })?;

        if let ToolServerConfig::Http { url } = &self.tools.server {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::Invalid {
                    reason: format!("tool server url must be http(s): '{url}'"),
                });
            }
        }
        if self.tools.call_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                reason: "tools.call_timeout_secs must be positive".into(),
            });
        }
        Ok(())
    }
}

// ─── Interpolation ───────────────────────────────────────────────────────────

/// Replace `${VAR}` and `${VAR:-default}` with environment values.
fn interpolate_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next();
            let mut expr = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                expr.push(c);
            }
            result.push_str(&resolve_var_expr(&expr));
        } else {
            result.push(ch);
        }
    }

    result
}

fn resolve_var_expr(expr: &str) -> String {
    match expr.split_once(":-") {
        Some((name, default)) => std::env::var(name).unwrap_or_else(|_| expand_tilde(default)),
        None => std::env::var(expr).unwrap_or_default(),
    }
}

/// Expand a leading `~` to the user's home directory.
pub(crate) fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix('~') {
        if let Some(home) = dirs::home_dir() {
            return format!("{}{rest}", home.display());
        }
    }
    path.to_string()
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_match_service_contract() {
        let config = AppConfig::default();
        assert_eq!(config.server.bind_address(), "0.0.0.0:8001");
        assert_eq!(config.tools.server.label(), "http://localhost:8000/mcp");
        assert_eq!(config.gemini.model, "gemini-2.5-flash");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_interpolate_env_vars_with_default() {
        let result = interpolate_env_vars("${__FUSE_TEST_NONEXISTENT_VAR__:-/fallback/path}");
        assert_eq!(result, "/fallback/path");
    }

    #[test]
    fn test_interpolate_unset_without_default_is_empty() {
        let result = interpolate_env_vars("key: '${__FUSE_TEST_NONEXISTENT_VAR__}'");
        assert_eq!(result, "key: ''");
    }

    #[test]
    fn test_interpolate_leaves_plain_dollars() {
        assert_eq!(interpolate_env_vars("cost: $5"), "cost: $5");
    }

    #[test]
    fn test_expand_tilde_without_prefix_is_identity() {
        assert_eq!(expand_tilde("/var/log/agent.log"), "/var/log/agent.log");
    }

    #[test]
    fn test_load_from_path_partial_file() {
        let file = write_config(
            "gemini:\n  temperature: 0.7\n  model: ${__FUSE_TEST_NONEXISTENT_VAR__:-gemini-2.5-pro}\nserver:\n  port: 9000\n",
        );
        let config = load_from_path(file.path()).unwrap();
        assert!((config.gemini.temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(config.gemini.model, "gemini-2.5-pro");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, DEFAULT_HOST);
    }

    #[test]
    fn test_load_from_path_stdio_tools() {
        let file = write_config(
            "tools:\n  server:\n    transport: stdio\n    command: python\n    args: [task_server.py]\n  call_timeout_secs: 15\n",
        );
        let config = load_from_path(file.path()).unwrap();
        assert!(matches!(config.tools.server, ToolServerConfig::Stdio { .. }));
        assert_eq!(config.tools.call_timeout(), Duration::from_secs(15));
    }

    #[test]
    fn test_load_from_path_empty_file_is_default() {
        let file = write_config("");
        assert_eq!(load_from_path(file.path()).unwrap(), AppConfig::default());
    }

    #[test]
    fn test_load_from_path_missing_file() {
        let err = load_from_path(Path::new("/nonexistent/fuse-agent.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_load_from_path_bad_yaml() {
        let file = write_config("server: [unclosed\n");
        let err = load_from_path(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AppConfig::default();
        config
            .apply_env_overrides(env(&[
                ("GEMINI_API_KEY", "secret"),
                ("MCP_SERVER_URL", "http://tools:8000/mcp"),
                ("DEFAULT_HOST", "127.0.0.1"),
                ("DEFAULT_PORT", "8080"),
            ]))
            .unwrap();

        assert_eq!(config.gemini.api_key.as_deref(), Some("secret"));
        assert_eq!(config.tools.server.label(), "http://tools:8000/mcp");
        assert_eq!(config.server.bind_address(), "127.0.0.1:8080");
    }

    #[test]
    fn test_empty_env_values_are_ignored() {
        let mut config = AppConfig::default();
        config
            .apply_env_overrides(env(&[("GEMINI_API_KEY", ""), ("DEFAULT_HOST", "  ")]))
            .unwrap();
        assert!(config.gemini.api_key.is_none());
        assert_eq!(config.server.host, DEFAULT_HOST);
    }

    #[test]
    fn test_bad_port_override_is_invalid() {
        let mut config = AppConfig::default();
        let err = config
            .apply_env_overrides(env(&[("DEFAULT_PORT", "eighty")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_validate_rejects_non_http_tool_url() {
        let mut config = AppConfig::default();
        config.tools.server = ToolServerConfig::Http {
            url: "localhost:8000".into(),
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));
    }
}
