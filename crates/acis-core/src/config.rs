use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AcisError, Result};

/// Top-level configuration shared by all three processes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub mcp_server: McpServerSettings,
    #[serde(default)]
    pub mcp: McpClientConfig,
    #[serde(default)]
    pub client: ClientConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model_id")]
    pub model_id: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model_id: default_model_id(),
            api_key: None,
            base_url: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            retry: None,
        }
    }
}

impl ModelConfig {
    /// The API key, or an error naming the variable that should provide it.
    /// A `${VAR}` reference left unexpanded counts as missing.
    pub fn require_api_key(&self) -> Result<&str> {
        match self.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() && !key.starts_with("${") => Ok(key),
            _ => Err(AcisError::Config(
                "OPENAI_API_KEY environment variable is required".into(),
            )),
        }
    }
}

fn default_provider() -> String { "openai".to_string() }
fn default_model_id() -> String { "gpt-3.5-turbo".to_string() }
fn default_max_tokens() -> u32 { 1024 }
fn default_temperature() -> f32 { 0.1 }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

fn default_max_retries() -> u32 { 3 }
fn default_initial_backoff() -> u64 { 1000 }
fn default_max_backoff() -> u64 { 30000 }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,
    #[serde(default = "default_max_duration")]
    pub max_duration_secs: u64,
    /// Extra operator instructions appended to the onboarding prompt.
    /// A `file:` prefix loads them from disk.
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub parallel_tools: bool,
    /// Prior messages replayed to the model on each request.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    /// Run the LLM extraction pass after each agent reply.
    #[serde(default = "default_extract_state")]
    pub extract_state: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            max_duration_secs: default_max_duration(),
            system_prompt: None,
            parallel_tools: false,
            history_limit: default_history_limit(),
            extract_state: default_extract_state(),
        }
    }
}

fn default_max_turns() -> usize { 10 }
fn default_max_duration() -> u64 { 120 }
fn default_history_limit() -> usize { 40 }
fn default_extract_state() -> bool { true }

/// Orchestration server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_server_port")]
    pub port: u16,
    /// Bearer token required on session routes when set.
    #[serde(default)]
    pub token: Option<String>,
    /// SQLite file for sessions. In-memory when unset.
    #[serde(default)]
    pub session_db: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_server_port(),
            token: None,
            session_db: None,
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

fn default_host() -> String { "localhost".to_string() }
fn default_server_port() -> u16 { 8000 }

/// MCP tools server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_mcp_port")]
    pub port: u16,
    #[serde(default = "default_mcp_path")]
    pub path: String,
}

impl Default for McpServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_mcp_port(),
            path: default_mcp_path(),
        }
    }
}

impl McpServerSettings {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn url(&self) -> String {
        format!("http://{}:{}{}", self.host, self.port, self.path)
    }
}

fn default_mcp_port() -> u16 { 8001 }
fn default_mcp_path() -> String { "/mcp".to_string() }

/// How the orchestration server reaches the tools server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpClientConfig {
    #[serde(default = "default_mcp_server_name")]
    pub server_name: String,
    /// Explicit transport. Defaults to streamable HTTP at `[mcp_server]`.
    #[serde(default)]
    pub transport: Option<McpTransport>,
    /// Per-tool-call timeout in seconds.
    #[serde(default = "default_mcp_timeout")]
    pub timeout_secs: u64,
    /// Register in-process tools when the server cannot be reached.
    #[serde(default = "default_fallback_local")]
    pub fallback_local: bool,
}

impl Default for McpClientConfig {
    fn default() -> Self {
        Self {
            server_name: default_mcp_server_name(),
            transport: None,
            timeout_secs: default_mcp_timeout(),
            fallback_local: default_fallback_local(),
        }
    }
}

impl McpClientConfig {
    pub fn resolve_transport(&self, server: &McpServerSettings) -> McpTransport {
        self.transport
            .clone()
            .unwrap_or_else(|| McpTransport::Http { url: server.url() })
    }
}

fn default_mcp_server_name() -> String { "onboarding".to_string() }
fn default_mcp_timeout() -> u64 { 120 }
fn default_fallback_local() -> bool { true }

/// MCP transport configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum McpTransport {
    Stdio {
        command: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        env: std::collections::HashMap<String, String>,
    },
    Http {
        url: String,
    },
}

/// Terminal client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Orchestration server URL. Derived from `[server]` when unset.
    #[serde(default)]
    pub server_url: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default = "default_chat_timeout")]
    pub chat_timeout_secs: u64,
    #[serde(default = "default_reset_timeout")]
    pub reset_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: None,
            session_id: None,
            chat_timeout_secs: default_chat_timeout(),
            reset_timeout_secs: default_reset_timeout(),
        }
    }
}

fn default_chat_timeout() -> u64 { 30 }
fn default_reset_timeout() -> u64 { 10 }

impl AppConfig {
    /// Load config from a TOML file, with env var expansion.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| AcisError::ConfigNotFound(path.display().to_string()))?;

        // Expand ${ENV_VAR} references
        let expanded = expand_env_vars(&content);

        toml::from_str(&expanded).map_err(|e| AcisError::Config(e.to_string()))
    }

    /// Load `.env`, then the TOML file if it exists, then environment overrides.
    pub fn resolve(path: &Path) -> Result<Self> {
        load_dotenv();
        let mut config = if path.exists() {
            Self::load(path)?
        } else {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            Self::default()
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any variable lookup.
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(key) = get("OPENAI_API_KEY") {
            if self.model.require_api_key().is_err() {
                self.model.api_key = Some(key);
            }
        }
        if let Some(model) = get("OPENAI_MODEL") {
            self.model.model_id = model;
        }
        if let Some(url) = get("OPENAI_BASE_URL") {
            self.model.base_url = Some(url);
        }
        if let Some(host) = get("SERVER_HOST") {
            self.server.host = host;
        }
        if let Some(port) = get("SERVER_PORT") {
            self.server.port = parse_port("SERVER_PORT", &port)?;
        }
        if let Some(host) = get("MCP_SERVER_HOST") {
            self.mcp_server.host = host;
        }
        if let Some(port) = get("MCP_SERVER_PORT") {
            self.mcp_server.port = parse_port("MCP_SERVER_PORT", &port)?;
        }
        Ok(())
    }

    /// URL the client should talk to.
    pub fn client_server_url(&self) -> String {
        self.client
            .server_url
            .clone()
            .unwrap_or_else(|| self.server.base_url())
    }

    /// Copy with secrets masked, for display.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.model.api_key.is_some() {
            copy.model.api_key = Some("***".into());
        }
        if copy.server.token.is_some() {
            copy.server.token = Some("***".into());
        }
        copy
    }
}

/// Load variables from a `.env` file in the working directory, if any.
/// Variables already set in the environment win.
pub fn load_dotenv() {
    let _ = dotenvy::dotenv();
}

fn parse_port(var: &str, raw: &str) -> Result<u16> {
    raw.parse::<u16>()
        .map_err(|_| AcisError::Config(format!("{var} must be a port number, got {raw:?}")))
}

/// Expand `${ENV_VAR}` patterns in a string.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }
            match std::env::var(&var_name) {
                Ok(val) => result.push_str(&val),
                // Keep the reference so require_api_key can report it
                Err(_) => result.push_str(&format!("${{{}}}", var_name)),
            }
        } else {
            result.push(c);
        }
    }
    result
}
