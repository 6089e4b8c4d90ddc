use futures::future::BoxFuture;
use futures::stream::BoxStream;

use crate::config::ModelConfig;
use crate::error::Result;
use crate::onboarding::{B2BData, OnboardingReceipt, OnboardingRequest, OnboardingState, StoreId, StoreInfo};
use crate::types::*;

/// LLM client: streaming chat completions.
pub trait LlmClient: Send + Sync + 'static {
    /// Send a chat request and receive a stream of deltas.
    fn chat_stream(
        &self,
        config: &ModelConfig,
        messages: Vec<ChatMessage>,
        tools: &[ToolDefinition],
    ) -> BoxFuture<'_, Result<BoxStream<'_, Result<StreamDelta>>>>;
}

/// Tool: callable by the agent during a run.
pub trait Tool: Send + Sync + 'static {
    /// Tool name (used in LLM tool calls).
    fn name(&self) -> &str;

    /// Human-readable description.
    fn description(&self) -> &str;

    /// JSON Schema for tool input.
    fn input_schema(&self) -> serde_json::Value;

    /// Execute the tool with given input and context.
    fn execute(
        &self,
        input: serde_json::Value,
        ctx: ToolContext,
    ) -> BoxFuture<'_, Result<ToolResult>>;

    /// Timeout in seconds for this tool.
    fn timeout_secs(&self) -> u64 {
        30
    }
}

/// Session store: persistence backend for history and onboarding state.
pub trait SessionStore: Send + Sync + 'static {
    /// Append messages to a session.
    fn append_messages(&self, sid: &SessionId, msgs: &[ChatMessage]) -> BoxFuture<'_, Result<()>>;

    /// Load the most recent `limit` messages, oldest first.
    fn load_history(
        &self,
        sid: &SessionId,
        limit: usize,
    ) -> BoxFuture<'_, Result<Vec<ChatMessage>>>;

    /// Load the onboarding state, or the initial state if none was saved.
    fn load_state(&self, sid: &SessionId) -> BoxFuture<'_, Result<OnboardingState>>;

    /// Persist the onboarding state, replacing any previous one.
    fn save_state(&self, sid: &SessionId, state: &OnboardingState) -> BoxFuture<'_, Result<()>>;

    /// Delete history and state for a session.
    fn reset_session(&self, sid: &SessionId) -> BoxFuture<'_, Result<()>>;

    /// Sessions that have history or saved state.
    fn list_sessions(&self) -> BoxFuture<'_, Result<Vec<SessionId>>>;
}

/// Store directory: the data source behind the onboarding tools.
pub trait StoreDirectory: Send + Sync + 'static {
    /// Team and profile assigned to a store.
    fn store_info(&self, store_id: &StoreId) -> BoxFuture<'_, Result<StoreInfo>>;

    /// B2B profiles and identities available to a store.
    fn b2b_data(&self, store_id: &StoreId) -> BoxFuture<'_, Result<B2BData>>;

    /// Start onboarding with the user's confirmed selections.
    fn onboard(&self, request: OnboardingRequest) -> BoxFuture<'_, Result<OnboardingReceipt>>;
}
