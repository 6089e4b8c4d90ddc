//! All three processes in one test: the MCP tools server, the
//! orchestration server bridged to it, and the HTTP client.

use std::sync::Arc;

use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use acis_agent::{AgentRuntime, OnboardingWorkflow};
use acis_core::config::{AppConfig, McpTransport};
use acis_core::event::EventBus;
use acis_core::onboarding::{tool_names, OnboardingStep, StoreId};
use acis_core::traits::LlmClient;
use acis_core::types::SessionId;
use acis_gateway::GatewayServer;
use acis_mcp::{McpClientManager, ToolSource};
use acis_memory::SqliteStore;
use acis_test_utils::{test_config, ScriptedLlm};
use acis_tools::{MockDirectory, ToolRegistry};
use acis_tui::ApiClient;

async fn start_mcp_server(shutdown: CancellationToken) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(acis_mcp::serve_http_on(
        listener,
        "/mcp",
        Arc::new(MockDirectory::new()),
        shutdown,
    ));
    format!("http://{}/mcp", addr)
}

async fn start_gateway(
    config: AppConfig,
    llm: ScriptedLlm,
    shutdown: CancellationToken,
) -> (String, ToolSource, Arc<McpClientManager>) {
    let manager = Arc::new(McpClientManager::new());
    let mut registry = ToolRegistry::new();
    let source = acis_mcp::attach_onboarding_tools(&config, &manager, &mut registry)
        .await
        .unwrap();

    let server_config = config.server.clone();
    let runtime = AgentRuntime::new(
        config,
        Arc::new(llm) as Arc<dyn LlmClient>,
        Arc::new(RwLock::new(registry)),
        Arc::new(SqliteStore::in_memory().unwrap()),
        Arc::new(EventBus::default()),
    );
    let workflow = Arc::new(OnboardingWorkflow::new(runtime));
    let server = GatewayServer::new(server_config, workflow, source.to_string());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { server.run_on(listener, shutdown).await });
    (format!("http://{}", addr), source, manager)
}

#[tokio::test]
async fn onboarding_through_mcp_tools() {
    let shutdown = CancellationToken::new();
    let mcp_url = start_mcp_server(shutdown.clone()).await;

    let store = StoreId::parse("ABC123").unwrap();
    let info = MockDirectory::lookup(&store);
    let options = MockDirectory::options(&store);
    let profile = options.profiles[0].clone();
    let identity = options.identities[0].clone();

    let llm = ScriptedLlm::new()
        .then_tool_calls(&[
            ("c1", tool_names::STORE_INFO, json!({"store_id": "ABC123"})),
            ("c2", tool_names::B2B_DATA, json!({"store_id": "ABC123"})),
        ])
        .then_text("Which profiles and identities would you like?")
        .then_tool_call(
            "c3",
            tool_names::ONBOARD_USER,
            json!({
                "store_id": "ABC123",
                "team_name": info.team_name,
                "profile_name": info.profile_name,
                "selected_profiles": [profile],
                "selected_identities": [identity]
            }),
        )
        .then_text("Onboarding completed successfully!");

    let mut config = test_config();
    config.agent.extract_state = false;
    config.mcp.fallback_local = false;
    config.mcp.transport = Some(McpTransport::Http { url: mcp_url });

    let (base_url, source, manager) = start_gateway(config, llm, shutdown.clone()).await;
    assert_eq!(
        source,
        ToolSource::Mcp {
            server: "onboarding".into(),
            tools: 3
        }
    );

    let api = ApiClient::new(base_url);
    let health = api.health().await.unwrap();
    assert_eq!(health["tools"], "mcp:onboarding (3 tools)");

    let sid = SessionId::from_string("e2e");
    let reply = api.chat(&sid, "My store is ABC123").await.unwrap();
    assert_eq!(reply.state.team_name.as_deref(), Some(info.team_name.as_str()));
    assert_eq!(reply.state.b2b_profiles.as_ref(), Some(&options.profiles));
    assert_eq!(reply.state.step, OnboardingStep::CollectSelections);

    let reply = api.chat(&sid, "The first of each, confirmed").await.unwrap();
    assert!(reply.completed);
    assert_eq!(
        reply.state.onboarding_id,
        Some(MockDirectory::onboarding_id(&store))
    );

    let state = api.state(&sid).await.unwrap();
    assert!(state.is_completed());

    api.reset(&sid).await.unwrap();
    assert_eq!(api.state(&sid).await.unwrap().step, OnboardingStep::CollectStoreId);

    manager.disconnect_all().await;
    shutdown.cancel();
}

#[tokio::test]
async fn unreachable_mcp_server_falls_back_to_local_tools() {
    let shutdown = CancellationToken::new();
    let mut config = test_config();
    config.agent.extract_state = false;
    config.mcp.transport = Some(McpTransport::Http {
        url: "http://127.0.0.1:1/mcp".into(),
    });

    let llm = ScriptedLlm::new()
        .then_tool_call("c1", tool_names::STORE_INFO, json!({"store_id": "S-9"}))
        .then_text("Found your store.");
    let (base_url, source, _manager) = start_gateway(config, llm, shutdown.clone()).await;
    assert_eq!(source, ToolSource::Local);

    let api = ApiClient::new(base_url);
    let reply = api.chat(&SessionId::default(), "S-9").await.unwrap();
    assert_eq!(reply.response, "Found your store.");
    assert_eq!(reply.state.step, OnboardingStep::FetchB2bData);

    shutdown.cancel();
}
