use std::sync::Arc;

use acis_agent::OnboardingWorkflow;
use acis_core::config::ServerConfig;

/// Shared application state for axum handlers.
pub struct AppState {
    pub config: ServerConfig,
    pub workflow: Arc<OnboardingWorkflow>,
    /// Where the onboarding tools came from, reported by the health route.
    pub tool_source: String,
}
