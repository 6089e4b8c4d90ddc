//! The onboarding tools exposed as an MCP server.

use std::sync::Arc;

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, Content, Implementation, ServerCapabilities, ServerInfo};
use rmcp::transport::streamable_http_server::session::local::LocalSessionManager;
use rmcp::transport::streamable_http_server::{StreamableHttpServerConfig, StreamableHttpService};
use rmcp::{tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler, ServiceExt};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use acis_core::config::McpServerSettings;
use acis_core::error::AcisError;
use acis_core::traits::StoreDirectory;
use acis_tools::{OnboardUserArgs, StoreIdArgs};

const INSTRUCTIONS: &str = "Tools for onboarding a store onto ACIS: look up the store's team \
and profile, list its B2B profile and identity options, then submit the user's selections.";

#[derive(Clone)]
pub struct OnboardingToolServer {
    directory: Arc<dyn StoreDirectory>,
    tool_router: ToolRouter<Self>,
}

/// Invalid arguments are reported to the caller as a tool error; anything
/// else is a server fault.
fn tool_failure(tool: &str, err: AcisError) -> std::result::Result<CallToolResult, McpError> {
    match err {
        AcisError::InvalidStoreId(_) | AcisError::ToolValidation(_) => {
            warn!(tool, error = %err, "Rejected tool call");
            Ok(CallToolResult::error(vec![Content::text(err.to_string())]))
        }
        other => Err(McpError::internal_error(other.to_string(), None)),
    }
}

#[tool_router]
impl OnboardingToolServer {
    pub fn new(directory: Arc<dyn StoreDirectory>) -> Self {
        Self {
            directory,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(
        description = "Get the team name and profile name assigned to a store. Call this first, once the user has given their store ID."
    )]
    async fn get_profile_and_team_name_by_store_id(
        &self,
        Parameters(args): Parameters<StoreIdArgs>,
    ) -> std::result::Result<CallToolResult, McpError> {
        let tool = "get_profile_and_team_name_by_store_id";
        let store_id = match args.store_id() {
            Ok(id) => id,
            Err(e) => return tool_failure(tool, e),
        };
        info!(store_id = %store_id, "Store lookup");
        match self.directory.store_info(&store_id).await {
            Ok(info) => Ok(CallToolResult::success(vec![Content::json(&info)?])),
            Err(e) => tool_failure(tool, e),
        }
    }

    #[tool(description = "Get the B2B profiles and B2B identities a store can choose from.")]
    async fn get_b2b_profiles_and_identities_by_store_id(
        &self,
        Parameters(args): Parameters<StoreIdArgs>,
    ) -> std::result::Result<CallToolResult, McpError> {
        let tool = "get_b2b_profiles_and_identities_by_store_id";
        let store_id = match args.store_id() {
            Ok(id) => id,
            Err(e) => return tool_failure(tool, e),
        };
        info!(store_id = %store_id, "B2B options lookup");
        match self.directory.b2b_data(&store_id).await {
            Ok(data) => Ok(CallToolResult::success(vec![Content::json(&data)?])),
            Err(e) => tool_failure(tool, e),
        }
    }

    #[tool(
        description = "Onboard the user with their selected B2B profiles and identities. Only call this after the user has confirmed their selections."
    )]
    async fn onboard_user(
        &self,
        Parameters(args): Parameters<OnboardUserArgs>,
    ) -> std::result::Result<CallToolResult, McpError> {
        let request = match args.into_request() {
            Ok(r) => r,
            Err(e) => return tool_failure("onboard_user", e),
        };
        match self.directory.onboard(request).await {
            Ok(receipt) => Ok(CallToolResult::success(vec![Content::json(&receipt)?])),
            Err(e) => tool_failure("onboard_user", e),
        }
    }
}

#[tool_handler]
impl ServerHandler for OnboardingToolServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(INSTRUCTIONS.into()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "acis-onboarding".into(),
                title: None,
                version: env!("CARGO_PKG_VERSION").into(),
                description: None,
                icons: None,
                website_url: None,
            },
            ..Default::default()
        }
    }
}

fn mount_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

/// Bind the configured address and serve MCP over streamable HTTP until
/// `shutdown` fires.
pub async fn serve_http(
    settings: &McpServerSettings,
    directory: Arc<dyn StoreDirectory>,
    shutdown: CancellationToken,
) -> acis_core::error::Result<()> {
    let addr = settings.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| AcisError::Mcp(format!("Failed to bind {}: {}", addr, e)))?;
    serve_http_on(listener, &settings.path, directory, shutdown).await
}

/// Serve MCP over streamable HTTP on an already-bound listener.
pub async fn serve_http_on(
    listener: TcpListener,
    path: &str,
    directory: Arc<dyn StoreDirectory>,
    shutdown: CancellationToken,
) -> acis_core::error::Result<()> {
    let path = mount_path(path);
    let service = StreamableHttpService::new(
        move || Ok(OnboardingToolServer::new(directory.clone())),
        LocalSessionManager::default().into(),
        StreamableHttpServerConfig::default(),
    );
    let router = axum::Router::new().nest_service(&path, service);

    if let Ok(addr) = listener.local_addr() {
        info!(addr = %addr, path = %path, "MCP tools server listening");
    }

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| AcisError::Mcp(format!("MCP server error: {}", e)))?;

    info!("MCP tools server stopped");
    Ok(())
}

/// Serve MCP over stdin/stdout until the peer disconnects.
pub async fn serve_stdio(directory: Arc<dyn StoreDirectory>) -> acis_core::error::Result<()> {
    info!("MCP tools server on stdio");
    let running = OnboardingToolServer::new(directory)
        .serve(rmcp::transport::stdio())
        .await
        .map_err(|e| AcisError::Mcp(format!("MCP stdio init failed: {}", e)))?;
    running
        .waiting()
        .await
        .map_err(|e| AcisError::Mcp(format!("MCP stdio server error: {}", e)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use acis_core::onboarding::{tool_names, B2BData, OnboardingReceipt, StoreId, StoreInfo};
    use acis_tools::MockDirectory;
    use rmcp::model::RawContent;

    fn server() -> (OnboardingToolServer, Arc<MockDirectory>) {
        let directory = Arc::new(MockDirectory::new());
        (OnboardingToolServer::new(directory.clone()), directory)
    }

    fn text_of(result: &CallToolResult) -> String {
        match result.content[0].raw {
            RawContent::Text(ref t) => t.text.to_string(),
            _ => panic!("expected text content"),
        }
    }

    fn store(id: &str) -> Parameters<StoreIdArgs> {
        Parameters(StoreIdArgs {
            store_id: id.to_string(),
        })
    }

    #[test]
    fn advertises_the_three_tools() {
        let (server, _) = server();
        let mut names: Vec<String> = server
            .tool_router
            .list_all()
            .into_iter()
            .map(|t| t.name.to_string())
            .collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                tool_names::B2B_DATA,
                tool_names::STORE_INFO,
                tool_names::ONBOARD_USER
            ]
        );
        assert!(server.get_info().capabilities.tools.is_some());
    }

    #[tokio::test]
    async fn store_lookup_matches_directory() {
        let (server, _) = server();
        let result = server
            .get_profile_and_team_name_by_store_id(store("ABC123"))
            .await
            .unwrap();
        assert_ne!(result.is_error, Some(true));
        let info: StoreInfo = serde_json::from_str(&text_of(&result)).unwrap();
        assert_eq!(info, MockDirectory::lookup(&StoreId::parse("ABC123").unwrap()));
    }

    #[tokio::test]
    async fn b2b_lookup_matches_directory() {
        let (server, _) = server();
        let result = server
            .get_b2b_profiles_and_identities_by_store_id(store("ABC123"))
            .await
            .unwrap();
        let data: B2BData = serde_json::from_str(&text_of(&result)).unwrap();
        assert_eq!(data, MockDirectory::options(&StoreId::parse("ABC123").unwrap()));
    }

    #[tokio::test]
    async fn blank_store_id_is_a_tool_error() {
        let (server, _) = server();
        let result = server
            .get_profile_and_team_name_by_store_id(store("  "))
            .await
            .unwrap();
        assert_eq!(result.is_error, Some(true));
        assert!(text_of(&result).contains("store"));
    }

    #[tokio::test]
    async fn onboard_user_records_submission() {
        let (server, directory) = server();
        let result = server
            .onboard_user(Parameters(OnboardUserArgs {
                store_id: "ABC123".into(),
                team_name: "Alpha Team".into(),
                profile_name: "Enterprise Profile".into(),
                selected_profiles: vec!["Retail Profile".into()],
                selected_identities: vec!["Admin Identity".into()],
            }))
            .await
            .unwrap();
        let receipt: OnboardingReceipt = serde_json::from_str(&text_of(&result)).unwrap();
        assert!(receipt.is_success());
        assert_eq!(directory.onboarded().len(), 1);
    }

    #[test]
    fn mount_path_is_absolute() {
        assert_eq!(mount_path("/mcp"), "/mcp");
        assert_eq!(mount_path("mcp"), "/mcp");
    }
}
