mod doctor;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use acis_core::config::AppConfig;
use acis_core::event::EventBus;
use acis_core::traits::{SessionStore, StoreDirectory};
use acis_core::types::SessionId;

use acis_agent::{AgentRuntime, OnboardingWorkflow};
use acis_mcp::{McpClientManager, ToolSource};
use acis_memory::SqliteStore;
use acis_tools::{MockDirectory, ToolRegistry};
use acis_tui::ApiClient;

#[derive(Parser)]
#[command(name = "acis", version, about = "Conversational business onboarding assistant")]
struct Cli {
    /// Path to config file
    #[arg(short, long, env = "ACIS_CONFIG", default_value = "acis.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the MCP tools server
    McpServer {
        /// Transport to serve MCP over
        #[arg(long, value_enum, default_value_t = Transport::Http)]
        transport: Transport,
        /// Port to listen on (overrides config)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Run the orchestration server
    Serve {
        /// Port to listen on (overrides config)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Chat with the orchestration server
    Client {
        /// Session ID to resume (a new one is generated if not provided)
        #[arg(short, long)]
        session: Option<String>,
        /// Orchestration server URL (overrides config)
        #[arg(long)]
        server_url: Option<String>,
        /// Line-oriented mode instead of the terminal UI
        #[arg(long)]
        plain: bool,
    },
    /// Show current configuration with secrets masked
    Config,
    /// Run system health checks
    Doctor,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Transport {
    Http,
    Stdio,
}

/// Default log filter for a command. The terminal UI owns the screen,
/// so it stays quiet unless RUST_LOG says otherwise.
fn default_filter(command: &Commands) -> &'static str {
    match command {
        Commands::Client { plain: false, .. } => "off",
        Commands::Client { plain: true, .. } | Commands::Config | Commands::Doctor => "acis=warn",
        _ => "acis=info,warn",
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Before clap and tracing, so .env can set ACIS_CONFIG and RUST_LOG
    acis_core::config::load_dotenv();
    let cli = Cli::parse();

    // Handle completions before config loading
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "acis", &mut std::io::stdout());
        return Ok(());
    }

    // Logs go to stderr so stdio MCP and plain-mode output stay clean
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_filter(&cli.command))),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let mut config = AppConfig::resolve(&cli.config)?;

    match cli.command {
        Commands::McpServer { transport, port } => {
            if let Some(port) = port {
                config.mcp_server.port = port;
            }
            run_mcp_server(&config, transport).await?;
        }
        Commands::Serve { port } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            run_server(config).await?;
        }
        Commands::Client {
            session,
            server_url,
            plain,
        } => {
            if server_url.is_some() {
                config.client.server_url = server_url;
            }
            let session_id = session
                .or_else(|| config.client.session_id.clone())
                .map(|s| SessionId::from_string(&s))
                .unwrap_or_else(SessionId::new);
            let api = ApiClient::from_config(&config);
            debug!(server = %api.base_url(), session = %session_id, "Starting client");

            if plain {
                acis_tui::run_plain(api, session_id).await?;
            } else {
                acis_tui::run_tui(api, session_id).await?;
            }
        }
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&config.redacted())?);
        }
        Commands::Doctor => {
            println!("ACIS Doctor");
            println!("===========");
            let issues = doctor::run_doctor(&config).await;
            if issues > 0 {
                std::process::exit(1);
            }
        }
        // Handled before config loading
        Commands::Completions { .. } => {}
    }

    Ok(())
}

/// Cancel the token on Ctrl-C.
fn shutdown_on_ctrl_c(what: &'static str) -> CancellationToken {
    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutting down {}...", what);
        cancel_clone.cancel();
    });
    cancel
}

async fn run_mcp_server(config: &AppConfig, transport: Transport) -> anyhow::Result<()> {
    let directory: Arc<dyn StoreDirectory> = Arc::new(MockDirectory::new());
    match transport {
        Transport::Http => {
            let shutdown = shutdown_on_ctrl_c("MCP tools server");
            acis_mcp::serve_http(&config.mcp_server, directory, shutdown).await?;
        }
        Transport::Stdio => acis_mcp::serve_stdio(directory).await?,
    }
    Ok(())
}

fn open_store(session_db: Option<&str>) -> anyhow::Result<Arc<dyn SessionStore>> {
    let store = match session_db {
        Some(path) => {
            info!(path, "Using SQLite session store");
            SqliteStore::open(Path::new(path))?
        }
        None => {
            info!("Using in-memory session store");
            SqliteStore::in_memory()?
        }
    };
    Ok(Arc::new(store))
}

async fn run_server(config: AppConfig) -> anyhow::Result<()> {
    // Fail fast rather than on the first chat message
    config.model.require_api_key()?;

    let store = open_store(config.server.session_db.as_deref())?;
    let llm = acis_llm::build_client(&config.model)?;
    let event_bus = Arc::new(EventBus::default());

    let manager = Arc::new(McpClientManager::new());
    let mut registry = ToolRegistry::new();
    let source = acis_mcp::attach_onboarding_tools(&config, &manager, &mut registry).await?;
    let tools = Arc::new(RwLock::new(registry));

    let shutdown = shutdown_on_ctrl_c("orchestration server");

    if matches!(source, ToolSource::Mcp { .. }) {
        acis_mcp::spawn_tool_refresher(
            manager.clone(),
            tools.clone(),
            config.mcp.timeout_secs,
            shutdown.clone(),
        );
    }

    // Mirror agent events into the debug log
    let mut events = event_bus.subscribe();
    let log_cancel = shutdown.clone();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = log_cancel.cancelled() => break,
                event = events.recv() => match event {
                    Ok(event) => debug!(?event, "Agent event"),
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(_) => break,
                },
            }
        }
    });

    let server_config = config.server.clone();
    let runtime = AgentRuntime::new(config, llm, tools, store, event_bus);
    let runtime_cancel = runtime.cancel_token();
    let workflow = Arc::new(OnboardingWorkflow::new(runtime));

    info!(bind = %server_config.bind_addr(), tools = %source, "Starting orchestration server");
    let server = acis_gateway::GatewayServer::new(server_config, workflow, source.to_string());
    let result = server.run(shutdown).await;

    runtime_cancel.cancel();
    manager.disconnect_all().await;
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses() {
        Cli::command().debug_assert();
    }

    #[test]
    fn mcp_server_defaults_to_http() {
        let cli = Cli::try_parse_from(["acis", "mcp-server"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::McpServer {
                transport: Transport::Http,
                port: None
            }
        ));
    }

    #[test]
    fn client_flags() {
        let cli =
            Cli::try_parse_from(["acis", "client", "--session", "abc", "--plain"]).unwrap();
        match cli.command {
            Commands::Client { session, plain, .. } => {
                assert_eq!(session.as_deref(), Some("abc"));
                assert!(plain);
            }
            _ => panic!("expected client command"),
        }
    }

    #[test]
    fn tui_client_logs_nothing_by_default() {
        let cli = Cli::try_parse_from(["acis", "client"]).unwrap();
        assert_eq!(default_filter(&cli.command), "off");
        let cli = Cli::try_parse_from(["acis", "serve"]).unwrap();
        assert_eq!(default_filter(&cli.command), "acis=info,warn");
    }

    #[test]
    fn in_memory_store_when_no_path() {
        assert!(open_store(None).is_ok());
    }
}
