use std::collections::HashMap;

use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use rmcp::model::{CallToolRequestParams, RawContent, Tool as McpTool};
use rmcp::service::{Peer, RunningService};
use rmcp::transport::streamable_http_client::StreamableHttpClientTransport;
use rmcp::{RoleClient, ServiceExt};

use acis_core::config::McpTransport;
use acis_core::error::{AcisError, Result};

use crate::handler::{AcisClientHandler, McpEvent};

type McpConnection = RunningService<RoleClient, AcisClientHandler>;

/// Connections to MCP servers, keyed by server name.
pub struct McpClientManager {
    connections: Mutex<HashMap<String, McpConnection>>,
    transports: Mutex<HashMap<String, McpTransport>>,
    // Tool names bridged into a registry, per server
    bridged: Mutex<HashMap<String, Vec<String>>>,
    event_tx: broadcast::Sender<McpEvent>,
}

impl Default for McpClientManager {
    fn default() -> Self {
        let (event_tx, _) = broadcast::channel(64);
        Self {
            connections: Mutex::new(HashMap::new()),
            transports: Mutex::new(HashMap::new()),
            bridged: Mutex::new(HashMap::new()),
            event_tx,
        }
    }
}

impl McpClientManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to server notifications (tool list changes, log messages).
    pub fn subscribe_events(&self) -> broadcast::Receiver<McpEvent> {
        self.event_tx.subscribe()
    }

    /// Connect to an MCP server, replacing any existing connection of that name.
    pub async fn connect(&self, name: &str, transport: &McpTransport) -> Result<()> {
        let handler = AcisClientHandler::new(name, self.event_tx.clone());

        let client = match transport {
            McpTransport::Stdio { command, args, env } => {
                let mut cmd = tokio::process::Command::new(command);
                cmd.args(args);
                for (k, v) in env {
                    cmd.env(k, v);
                }

                let child = rmcp::transport::TokioChildProcess::new(cmd)
                    .map_err(|e| AcisError::Mcp(format!("Failed to spawn {}: {}", command, e)))?;

                handler.serve(child).await.map_err(|e| {
                    AcisError::Mcp(format!("MCP init for '{}' failed: {}", name, e))
                })?
            }
            McpTransport::Http { url } => {
                let http = StreamableHttpClientTransport::from_uri(url.as_str());

                <AcisClientHandler as ServiceExt<RoleClient>>::serve(handler, http)
                    .await
                    .map_err(|e| {
                        AcisError::Mcp(format!("MCP init for '{}' at {} failed: {}", name, url, e))
                    })?
            }
        };

        info!(server = %name, "MCP server connected");

        if let Some(mut old) = self
            .connections
            .lock()
            .await
            .insert(name.to_string(), client)
        {
            let _ = old.close().await;
        }
        self.transports
            .lock()
            .await
            .insert(name.to_string(), transport.clone());
        Ok(())
    }

    /// Reconnect a server using its stored transport.
    pub async fn reconnect(&self, server_name: &str) -> Result<()> {
        let transport = self
            .transports
            .lock()
            .await
            .get(server_name)
            .cloned()
            .ok_or_else(|| {
                AcisError::Mcp(format!("No stored transport for server '{}'", server_name))
            })?;

        if let Some(mut old) = self.connections.lock().await.remove(server_name) {
            let _ = old.close().await;
        }

        self.connect(server_name, &transport).await
    }

    /// Whether a server connection is still alive.
    pub async fn is_connected(&self, server_name: &str) -> bool {
        self.connections
            .lock()
            .await
            .get(server_name)
            .map(|c| !c.is_closed())
            .unwrap_or(false)
    }

    /// Names of connected servers.
    pub async fn connected_servers(&self) -> Vec<String> {
        self.connections.lock().await.keys().cloned().collect()
    }

    /// Handle to a connected server. The map lock is released before any
    /// request goes out, so calls to one server can overlap.
    async fn peer(&self, server_name: &str) -> Result<Peer<RoleClient>> {
        self.connections
            .lock()
            .await
            .get(server_name)
            .map(|c| c.peer().clone())
            .ok_or_else(|| AcisError::Mcp(format!("Server '{}' not connected", server_name)))
    }

    /// List tools from a connected server.
    pub async fn list_tools(&self, server_name: &str) -> Result<Vec<McpTool>> {
        let peer = self.peer(server_name).await?;

        let tools = peer.list_all_tools().await.map_err(|e| {
            AcisError::Mcp(format!("Failed to list tools from '{}': {}", server_name, e))
        })?;

        debug!(server = %server_name, count = tools.len(), "Listed MCP tools");
        Ok(tools)
    }

    /// Call a tool, reconnecting once if the transport has closed.
    pub async fn call_tool(
        &self,
        server_name: &str,
        tool_name: &str,
        arguments: Option<serde_json::Map<String, serde_json::Value>>,
    ) -> Result<String> {
        let result = self
            .call_tool_inner(server_name, tool_name, arguments.clone())
            .await;

        if let Err(AcisError::Mcp(ref msg)) = result {
            if msg.contains("closed") || msg.contains("Transport") {
                warn!(server = %server_name, "MCP transport closed, attempting reconnect");
                if self.reconnect(server_name).await.is_ok() {
                    return self.call_tool_inner(server_name, tool_name, arguments).await;
                }
            }
        }

        result
    }

    async fn call_tool_inner(
        &self,
        server_name: &str,
        tool_name: &str,
        arguments: Option<serde_json::Map<String, serde_json::Value>>,
    ) -> Result<String> {
        let peer = self.peer(server_name).await?;

        let params = CallToolRequestParams {
            name: tool_name.to_string().into(),
            arguments,
            meta: None,
            task: None,
        };

        let result = peer.call_tool(params).await.map_err(|e| {
            AcisError::Mcp(format!("Tool call '{}.{}' failed: {}", server_name, tool_name, e))
        })?;

        let content = result
            .content
            .iter()
            .map(|c| match c.raw {
                RawContent::Text(ref t) => t.text.to_string(),
                _ => format!("{:?}", c.raw),
            })
            .collect::<Vec<_>>()
            .join("\n");

        if result.is_error.unwrap_or(false) {
            return Err(AcisError::ToolExecution {
                tool: tool_name.to_string(),
                message: content,
            });
        }
        Ok(content)
    }

    pub(crate) async fn record_bridged(&self, server_name: &str, names: Vec<String>) {
        self.bridged
            .lock()
            .await
            .insert(server_name.to_string(), names);
    }

    pub(crate) async fn take_bridged(&self, server_name: &str) -> Vec<String> {
        self.bridged
            .lock()
            .await
            .remove(server_name)
            .unwrap_or_default()
    }

    /// Disconnect from a specific server.
    pub async fn disconnect(&self, server_name: &str) {
        if let Some(mut client) = self.connections.lock().await.remove(server_name) {
            let _ = client.close().await;
            info!(server = %server_name, "MCP server disconnected");
        }
    }

    /// Disconnect from all servers.
    pub async fn disconnect_all(&self) {
        let mut conns = self.connections.lock().await;
        for (name, mut client) in conns.drain() {
            let _ = client.close().await;
            info!(server = %name, "MCP server disconnected");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use futures::future::BoxFuture;
    use tokio::net::TcpListener;
    use tokio::sync::Barrier;
    use tokio_util::sync::CancellationToken;

    use acis_core::onboarding::{B2BData, OnboardingReceipt, OnboardingRequest, StoreId, StoreInfo};
    use acis_core::traits::StoreDirectory;
    use acis_tools::MockDirectory;

    /// Answers store lookups only once two of them are in flight together.
    struct PairedDirectory {
        barrier: Barrier,
    }

    impl StoreDirectory for PairedDirectory {
        fn store_info(&self, store_id: &StoreId) -> BoxFuture<'_, Result<StoreInfo>> {
            let info = MockDirectory::lookup(store_id);
            Box::pin(async move {
                self.barrier.wait().await;
                Ok(info)
            })
        }

        fn b2b_data(&self, store_id: &StoreId) -> BoxFuture<'_, Result<B2BData>> {
            let data = MockDirectory::options(store_id);
            Box::pin(async move { Ok(data) })
        }

        fn onboard(&self, request: OnboardingRequest) -> BoxFuture<'_, Result<OnboardingReceipt>> {
            Box::pin(async move { MockDirectory::new().onboard(request).await })
        }
    }

    async fn serve(directory: Arc<dyn StoreDirectory>, shutdown: CancellationToken) -> McpTransport {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(crate::serve_http_on(listener, "/mcp", directory, shutdown));
        McpTransport::Http {
            url: format!("http://{}/mcp", addr),
        }
    }

    fn store_args(id: &str) -> Option<serde_json::Map<String, serde_json::Value>> {
        serde_json::json!({ "store_id": id }).as_object().cloned()
    }

    #[tokio::test]
    async fn calls_to_one_server_overlap() {
        let shutdown = CancellationToken::new();
        let directory = Arc::new(PairedDirectory {
            barrier: Barrier::new(2),
        });
        let transport = serve(directory, shutdown.clone()).await;

        let manager = McpClientManager::new();
        manager.connect("onboarding", &transport).await.unwrap();

        let tool = acis_core::onboarding::tool_names::STORE_INFO;
        let both = async {
            tokio::join!(
                manager.call_tool("onboarding", tool, store_args("ABC123")),
                manager.call_tool("onboarding", tool, store_args("XYZ789")),
            )
        };
        let (a, b) = tokio::time::timeout(Duration::from_secs(10), both)
            .await
            .expect("calls were serialised");
        assert!(a.unwrap().contains("ABC123"));
        assert!(b.unwrap().contains("XYZ789"));

        manager.disconnect_all().await;
        shutdown.cancel();
    }

    #[tokio::test]
    async fn unknown_server_is_an_error() {
        let manager = McpClientManager::new();
        let err = manager.list_tools("missing").await.unwrap_err();
        assert!(matches!(err, AcisError::Mcp(msg) if msg.contains("not connected")));
    }
}
