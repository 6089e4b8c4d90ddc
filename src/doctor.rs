use std::path::Path;
use std::time::Duration;

use acis_core::config::{AppConfig, McpTransport};
use acis_mcp::McpClientManager;
use acis_tui::ApiClient;

/// How long each reachability check may take.
const CHECK_TIMEOUT: Duration = Duration::from_secs(5);

struct CheckResult {
    label: String,
    ok: bool,
    detail: String,
}

impl CheckResult {
    fn ok(label: &str, detail: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ok: true,
            detail: detail.into(),
        }
    }

    fn fail(label: &str, detail: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ok: false,
            detail: detail.into(),
        }
    }
}

/// Run all checks and print a report. Returns the number of issues.
pub async fn run_doctor(config: &AppConfig) -> usize {
    let checks = vec![
        check_api_key(config),
        check_provider(config),
        check_session_store(config),
        check_auth(config),
        check_mcp_server(config).await,
        check_orchestrator(config).await,
    ];

    let mut ok_count = 0;
    let mut fail_count = 0;

    for check in &checks {
        let icon = if check.ok { "[OK]" } else { "[!!]" };
        println!("  {} {}: {}", icon, check.label, check.detail);
        if check.ok {
            ok_count += 1;
        } else {
            fail_count += 1;
        }
    }

    println!();
    println!("  {} passed, {} issues found", ok_count, fail_count);
    fail_count
}

fn check_api_key(config: &AppConfig) -> CheckResult {
    match config.model.require_api_key() {
        Ok(_) => CheckResult::ok(
            "API Key",
            format!("Configured for {} ({})", config.model.model_id, config.model.provider),
        ),
        Err(e) => CheckResult::fail("API Key", e.to_string()),
    }
}

fn check_provider(config: &AppConfig) -> CheckResult {
    match acis_llm::create_client(&config.model) {
        Ok(_) => {
            let endpoint = config
                .model
                .base_url
                .as_deref()
                .unwrap_or("https://api.openai.com/v1");
            CheckResult::ok("Provider", format!("{} at {}", config.model.provider, endpoint))
        }
        Err(e) => CheckResult::fail("Provider", e.to_string()),
    }
}

fn check_session_store(config: &AppConfig) -> CheckResult {
    match config.server.session_db.as_deref() {
        None => CheckResult::ok("Session Store", "In-memory (sessions end with the server)"),
        Some(path) => match acis_memory::SqliteStore::open(Path::new(path)) {
            Ok(_) => CheckResult::ok("Session Store", path),
            Err(e) => CheckResult::fail("Session Store", format!("{}: {}", path, e)),
        },
    }
}

fn check_auth(config: &AppConfig) -> CheckResult {
    match config.server.token.as_deref().map(str::trim) {
        None => CheckResult::ok("Auth", "Disabled (session routes are open)"),
        Some("") => CheckResult::fail("Auth", "server.token is set but empty"),
        Some(_) => CheckResult::ok("Auth", "Bearer token required"),
    }
}

fn describe_transport(transport: &McpTransport) -> String {
    match transport {
        McpTransport::Http { url } => url.clone(),
        McpTransport::Stdio { command, args, .. } => {
            format!("stdio: {} {}", command, args.join(" ")).trim_end().to_string()
        }
    }
}

async fn check_mcp_server(config: &AppConfig) -> CheckResult {
    let transport = config.mcp.resolve_transport(&config.mcp_server);
    let target = describe_transport(&transport);
    let server = config.mcp.server_name.as_str();
    let manager = McpClientManager::new();

    let check = async {
        manager.connect(server, &transport).await?;
        manager.list_tools(server).await
    };
    let result = tokio::time::timeout(CHECK_TIMEOUT, check).await;
    manager.disconnect_all().await;

    let fallback = if config.mcp.fallback_local {
        " (in-process tools will be used)"
    } else {
        ""
    };
    match result {
        Ok(Ok(tools)) => CheckResult::ok("MCP Tools", format!("{} tools at {}", tools.len(), target)),
        Ok(Err(e)) => CheckResult::fail("MCP Tools", format!("{}: {}{}", target, e, fallback)),
        Err(_) => CheckResult::fail("MCP Tools", format!("{}: timed out{}", target, fallback)),
    }
}

async fn check_orchestrator(config: &AppConfig) -> CheckResult {
    let api = ApiClient::from_config(config).with_timeouts(CHECK_TIMEOUT, CHECK_TIMEOUT);
    match api.health().await {
        Ok(health) => {
            let tools = health
                .get("tools")
                .and_then(|t| t.as_str())
                .unwrap_or("unknown tools");
            CheckResult::ok("Server", format!("{} ({})", api.base_url(), tools))
        }
        Err(e) => CheckResult::fail("Server", format!("{}: {}", api.base_url(), e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_api_key_is_reported() {
        let config = AppConfig::default();
        assert!(!check_api_key(&config).ok);
    }

    #[test]
    fn unknown_provider_is_reported() {
        let mut config = AppConfig::default();
        config.model.provider = "carrier-pigeon".into();
        assert!(!check_provider(&config).ok);
    }

    #[test]
    fn in_memory_store_is_fine() {
        assert!(check_session_store(&AppConfig::default()).ok);
    }

    #[test]
    fn empty_token_is_an_issue() {
        let mut config = AppConfig::default();
        config.server.token = Some("  ".into());
        assert!(!check_auth(&config).ok);
        config.server.token = Some("secret".into());
        assert!(check_auth(&config).ok);
    }

    #[test]
    fn stdio_transport_is_described_by_command() {
        let transport = McpTransport::Stdio {
            command: "acis".into(),
            args: vec!["mcp-server".into(), "--transport".into(), "stdio".into()],
            env: Default::default(),
        };
        assert_eq!(
            describe_transport(&transport),
            "stdio: acis mcp-server --transport stdio"
        );
    }
}
