//! The onboarding workflow: an agent node followed by an update_state node,
//! run once per user message.

use std::sync::Arc;

use tracing::{debug, info, warn};

use acis_core::error::Result;
use acis_core::event::EventBus;
use acis_core::onboarding::{ChatReply, OnboardingState};
use acis_core::traits::SessionStore;
use acis_core::types::{AgentEvent, SessionId};

use crate::agent_loop::{AgentRuntime, RunOutcome};
use crate::context;
use crate::extract::{harvest_tool_results, StateExtractor};
use crate::session::SessionLanes;

pub const FALLBACK_RESPONSE: &str = "I'm sorry, I couldn't process your request.";

pub struct OnboardingWorkflow {
    runtime: AgentRuntime,
    store: Arc<dyn SessionStore>,
    event_bus: Arc<EventBus>,
    extractor: Option<StateExtractor>,
    operator_prompt: Option<String>,
    lanes: SessionLanes,
}

impl OnboardingWorkflow {
    pub fn new(runtime: AgentRuntime) -> Self {
        let config = runtime.config();
        let extractor = config
            .agent
            .extract_state
            .then(|| StateExtractor::new(runtime.llm(), config.model.clone()));
        let base_dir = std::env::current_dir().unwrap_or_default();
        let operator_prompt = config
            .agent
            .system_prompt
            .as_deref()
            .map(|spec| context::resolve_system_prompt(spec, &base_dir));

        Self {
            store: runtime.store(),
            event_bus: runtime.event_bus(),
            extractor,
            operator_prompt,
            lanes: SessionLanes::new(),
            runtime,
        }
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        self.event_bus.clone()
    }

    /// Process one user message for a session.
    ///
    /// State is saved only when the agent node succeeds; on error the
    /// session is left as it was.
    pub async fn process_message(&self, session_id: &SessionId, message: &str) -> Result<ChatReply> {
        let reply = {
            let _lane = self.lanes.acquire(session_id).await;
            self.run_workflow(session_id, message).await
        };
        self.lanes.prune_idle();
        reply
    }

    async fn run_workflow(&self, session_id: &SessionId, message: &str) -> Result<ChatReply> {
        let mut state = self.store.load_state(session_id).await?;
        debug!(session = %session_id, step = %state.step, "Processing message");

        let outcome = self.agent_node(session_id, &state, message).await?;
        let response = if outcome.text.trim().is_empty() {
            FALLBACK_RESPONSE.to_string()
        } else {
            outcome.text.clone()
        };

        self.update_state_node(&mut state, message, &response, &outcome)
            .await;

        self.store.save_state(session_id, &state).await?;
        self.event_bus.publish(AgentEvent::StateUpdated {
            session_id: session_id.clone(),
            step: state.step,
        });
        info!(session = %session_id, step = %state.step, "Onboarding state saved");

        Ok(ChatReply {
            response,
            completed: state.is_completed(),
            state,
        })
    }

    async fn agent_node(
        &self,
        session_id: &SessionId,
        state: &OnboardingState,
        message: &str,
    ) -> Result<RunOutcome> {
        let system = context::build_onboarding_context(state, self.operator_prompt.as_deref());
        self.runtime.run(session_id, system, message).await
    }

    async fn update_state_node(
        &self,
        state: &mut OnboardingState,
        message: &str,
        response: &str,
        outcome: &RunOutcome,
    ) {
        if let Some(extractor) = self.extractor.as_ref().filter(|_| !state.is_completed()) {
            match extractor.extract(state, message, response).await {
                Ok(updates) => {
                    let applied = state.apply_updates(&updates);
                    debug!(fields = ?applied, "Applied extracted state");
                }
                Err(e) => warn!(error = %e, "State extraction failed, keeping current state"),
            }
        }

        // Tool output is authoritative over whatever the extraction guessed
        let harvested = harvest_tool_results(state, &outcome.invocations);
        if harvested > 0 {
            debug!(harvested, "Applied tool results to state");
        }

        state.derive_step(response);
    }

    /// Saved state for a session, or the default for an unknown one.
    pub async fn state(&self, session_id: &SessionId) -> Result<OnboardingState> {
        self.store.load_state(session_id).await
    }

    /// Clear a session's history and state.
    pub async fn reset(&self, session_id: &SessionId) -> Result<()> {
        {
            let _lane = self.lanes.acquire(session_id).await;
            self.store.reset_session(session_id).await?;
        }
        self.lanes.prune_idle();
        self.event_bus.publish(AgentEvent::SessionReset {
            session_id: session_id.clone(),
        });
        info!(session = %session_id, "Session reset");
        Ok(())
    }

    /// Sessions with saved history or state.
    pub async fn sessions(&self) -> Result<Vec<SessionId>> {
        self.store.list_sessions().await
    }
}
