use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::info;

use acis_agent::OnboardingWorkflow;
use acis_core::config::ServerConfig;

use crate::routes;
use crate::state::AppState;

/// HTTP orchestration server built on axum.
pub struct GatewayServer {
    config: ServerConfig,
    workflow: Arc<OnboardingWorkflow>,
    tool_source: String,
}

impl GatewayServer {
    pub fn new(
        config: ServerConfig,
        workflow: Arc<OnboardingWorkflow>,
        tool_source: impl Into<String>,
    ) -> Self {
        Self {
            config,
            workflow,
            tool_source: tool_source.into(),
        }
    }

    /// The application router.
    pub fn router(&self) -> Router {
        let state = Arc::new(AppState {
            config: self.config.clone(),
            workflow: self.workflow.clone(),
            tool_source: self.tool_source.clone(),
        });

        Router::new()
            .route("/", get(routes::root))
            .route("/api/health", get(routes::health))
            .route("/chat", post(routes::chat))
            .route("/session/{id}/state", get(routes::session_state))
            .route("/session/{id}", axum::routing::delete(routes::reset_session))
            .route("/sessions", get(routes::list_sessions))
            .layer(CorsLayer::permissive())
            .with_state(state)
    }

    /// Bind the configured address and serve until the token is cancelled.
    pub async fn run(&self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let bind = self.config.bind_addr();
        let listener = TcpListener::bind(&bind).await?;
        self.run_on(listener, shutdown).await
    }

    /// Serve on an already-bound listener until the token is cancelled.
    pub async fn run_on(&self, listener: TcpListener, shutdown: CancellationToken) -> anyhow::Result<()> {
        let app = self.router();
        info!(addr = %listener.local_addr()?, "Orchestration server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        info!("Orchestration server shut down");
        Ok(())
    }
}
