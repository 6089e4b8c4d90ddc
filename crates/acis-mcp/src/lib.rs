mod bridge;
mod client;
mod handler;
pub mod server;

pub use bridge::{register_mcp_tools, McpBridgedTool};
pub use client::McpClientManager;
pub use handler::{AcisClientHandler, McpEvent};
pub use server::{serve_http, serve_http_on, serve_stdio, OnboardingToolServer};

use std::sync::Arc;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use acis_core::config::{AppConfig, McpTransport};
use acis_core::error::Result;
use acis_tools::{register_onboarding_tools, MockDirectory, ToolRegistry};

/// Where the agent's onboarding tools came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolSource {
    /// Bridged from a connected MCP server.
    Mcp { server: String, tools: usize },
    /// In-process tools over the mock directory.
    Local,
}

impl std::fmt::Display for ToolSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ToolSource::Mcp { server, tools } => write!(f, "mcp:{} ({} tools)", server, tools),
            ToolSource::Local => write!(f, "local"),
        }
    }
}

/// Connect to an MCP server and register its tools into the registry.
/// Returns the number of tools registered.
pub async fn connect_and_register(
    manager: &Arc<McpClientManager>,
    server_name: &str,
    transport: &McpTransport,
    timeout_secs: u64,
    registry: &mut ToolRegistry,
) -> Result<usize> {
    manager.connect(server_name, transport).await?;

    let tools = manager.list_tools(server_name).await?;
    let names = bridge::register_mcp_tools(registry, manager, server_name, &tools, timeout_secs);
    let count = names.len();
    manager.record_bridged(server_name, names).await;

    Ok(count)
}

/// Re-fetch tools from a server and replace the ones previously bridged from it.
/// Returns the new tool count.
pub async fn refresh_tools(
    manager: &Arc<McpClientManager>,
    server_name: &str,
    timeout_secs: u64,
    registry: &mut ToolRegistry,
) -> Result<usize> {
    let tools = manager.list_tools(server_name).await?;

    let old = manager.take_bridged(server_name).await;
    for name in &old {
        registry.unregister(name);
    }
    debug!(server = %server_name, removed = old.len(), "Unregistered old MCP tools");

    let names = bridge::register_mcp_tools(registry, manager, server_name, &tools, timeout_secs);
    let count = names.len();
    manager.record_bridged(server_name, names).await;
    Ok(count)
}

/// Give the registry its onboarding tools: bridged from the configured MCP
/// server, or in-process when the server is unreachable and fallback is on.
pub async fn attach_onboarding_tools(
    config: &AppConfig,
    manager: &Arc<McpClientManager>,
    registry: &mut ToolRegistry,
) -> Result<ToolSource> {
    let transport = config.mcp.resolve_transport(&config.mcp_server);
    let server = config.mcp.server_name.as_str();

    match connect_and_register(manager, server, &transport, config.mcp.timeout_secs, registry).await
    {
        Ok(tools) => {
            info!(server, tools, "Onboarding tools bridged from MCP server");
            Ok(ToolSource::Mcp {
                server: server.to_string(),
                tools,
            })
        }
        Err(e) if config.mcp.fallback_local => {
            warn!(server, error = %e, "MCP server unavailable, using in-process tools");
            register_onboarding_tools(registry, Arc::new(MockDirectory::new()));
            Ok(ToolSource::Local)
        }
        Err(e) => Err(e),
    }
}

/// Keep the registry in sync with a server's `tools/list_changed` notifications.
pub fn spawn_tool_refresher(
    manager: Arc<McpClientManager>,
    registry: Arc<RwLock<ToolRegistry>>,
    timeout_secs: u64,
    shutdown: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    let mut events = manager.subscribe_events();
    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                _ = shutdown.cancelled() => break,
                event = events.recv() => event,
            };
            match event {
                Ok(McpEvent::ToolsChanged { server }) => {
                    let mut reg = registry.write().await;
                    match refresh_tools(&manager, &server, timeout_secs, &mut reg).await {
                        Ok(count) => info!(server = %server, count, "Refreshed MCP tools"),
                        Err(e) => warn!(server = %server, error = %e, "MCP tool refresh failed"),
                    }
                }
                Ok(McpEvent::LogMessage { .. }) => {}
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    debug!(skipped = n, "MCP event receiver lagged");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
