use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use acis_core::config::AppConfig;
use acis_core::error::{AcisError, Result};
use acis_core::event::EventBus;
use acis_core::traits::{LlmClient, SessionStore};
use acis_core::types::*;
use acis_tools::ToolRegistry;

use crate::context;

/// Accumulator for streaming tool call deltas.
#[derive(Debug, Default)]
struct ToolCallAccumulator {
    id: String,
    name: String,
    input_json: String,
}

impl ToolCallAccumulator {
    fn parsed_input(&self) -> serde_json::Value {
        if self.input_json.trim().is_empty() {
            return serde_json::json!({});
        }
        serde_json::from_str(&self.input_json).unwrap_or(serde_json::Value::Null)
    }
}

/// One tool call made during a run.
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    pub name: String,
    pub input: serde_json::Value,
    pub result: ToolResult,
}

/// What a completed run produced.
#[derive(Debug, Clone, Default)]
pub struct RunOutcome {
    /// Text of the final assistant turn.
    pub text: String,
    pub invocations: Vec<ToolInvocation>,
    pub turns: usize,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// The agent runtime: a streaming ReAct loop over the tool registry.
pub struct AgentRuntime {
    config: AppConfig,
    llm: Arc<dyn LlmClient>,
    tools: Arc<RwLock<ToolRegistry>>,
    store: Arc<dyn SessionStore>,
    event_bus: Arc<EventBus>,
    cancel: CancellationToken,
}

impl AgentRuntime {
    pub fn new(
        config: AppConfig,
        llm: impl Into<Arc<dyn LlmClient>>,
        tools: Arc<RwLock<ToolRegistry>>,
        store: Arc<dyn SessionStore>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            config,
            llm: llm.into(),
            tools,
            store,
            event_bus,
            cancel: CancellationToken::new(),
        }
    }

    /// Get a cancellation token for this runtime.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn llm(&self) -> Arc<dyn LlmClient> {
        self.llm.clone()
    }

    pub fn store(&self) -> Arc<dyn SessionStore> {
        self.store.clone()
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        self.event_bus.clone()
    }

    async fn execute_tool(
        tools: &RwLock<ToolRegistry>,
        name: &str,
        input: serde_json::Value,
        ctx: ToolContext,
    ) -> ToolResult {
        match tools.read().await.execute(name, input, ctx).await {
            Ok(r) => r,
            Err(e) => {
                error!(tool = %name, error = %e, "Tool execution failed");
                ToolResult::error(e.to_string())
            }
        }
    }

    /// Run the loop for one user message.
    ///
    /// The user message and every message the run produces are persisted
    /// together once the run succeeds. A failed run leaves history untouched.
    pub async fn run(
        &self,
        session_id: &SessionId,
        system_msg: ChatMessage,
        user_message: &str,
    ) -> Result<RunOutcome> {
        let start = Instant::now();
        let max_turns = self.config.agent.max_turns;
        let max_duration = Duration::from_secs(self.config.agent.max_duration_secs);

        self.event_bus.publish(AgentEvent::RunStarted {
            session_id: session_id.clone(),
        });

        let result = self
            .run_inner(session_id, system_msg, user_message, start, max_turns, max_duration)
            .await;

        if let Err(ref e) = result {
            self.event_bus.publish(AgentEvent::RunError {
                error: e.to_string(),
            });
        }
        result
    }

    async fn run_inner(
        &self,
        session_id: &SessionId,
        system_msg: ChatMessage,
        user_message: &str,
        start: Instant,
        max_turns: usize,
        max_duration: Duration,
    ) -> Result<RunOutcome> {
        let mut history = self
            .store
            .load_history(session_id, self.config.agent.history_limit)
            .await?;
        let dropped = context::trim_orphaned_tool_results(&mut history);
        if dropped > 0 {
            debug!(dropped, "Dropped tool results cut off from their call");
        }

        let mut messages = vec![system_msg];
        messages.extend(history);

        let user_msg = ChatMessage::user(user_message);
        let mut produced = vec![user_msg.clone()];
        messages.push(user_msg);

        let tool_defs = self.tools.read().await.definitions();
        let tool_ctx = ToolContext {
            session_id: session_id.clone(),
        };

        let mut outcome = RunOutcome::default();

        for turn in 0..max_turns {
            if self.cancel.is_cancelled() {
                return Err(AcisError::Cancelled);
            }

            if start.elapsed() > max_duration {
                return Err(AcisError::MaxDurationExceeded(
                    self.config.agent.max_duration_secs,
                ));
            }

            debug!(turn, "Starting agent turn");

            let stream_result = tokio::select! {
                result = self.llm.chat_stream(&self.config.model, messages.clone(), &tool_defs) => result,
                _ = self.cancel.cancelled() => return Err(AcisError::Cancelled),
            };

            let mut stream = stream_result?;

            let mut text_content = String::new();
            let mut tool_calls: Vec<ToolCallAccumulator> = Vec::new();
            let mut stop_reason = None;

            while let Some(delta) = stream.next().await {
                if self.cancel.is_cancelled() {
                    return Err(AcisError::Cancelled);
                }

                match delta? {
                    StreamDelta::TextDelta(text) => {
                        self.event_bus.publish(AgentEvent::TextDelta(text.clone()));
                        text_content.push_str(&text);
                    }
                    StreamDelta::ToolUseStart { index, id, name } => {
                        while tool_calls.len() <= index {
                            tool_calls.push(ToolCallAccumulator::default());
                        }
                        tool_calls[index].id = id;
                        tool_calls[index].name = name;
                    }
                    StreamDelta::ToolInputDelta { index, delta } => {
                        if let Some(tc) = tool_calls.get_mut(index) {
                            tc.input_json.push_str(&delta);
                        }
                    }
                    StreamDelta::Stop(reason) => {
                        stop_reason = Some(reason);
                    }
                    StreamDelta::Usage {
                        input_tokens,
                        output_tokens,
                    } => {
                        outcome.input_tokens += input_tokens;
                        outcome.output_tokens += output_tokens;
                    }
                    StreamDelta::MessageId(_) => {}
                }
            }

            // Drop slots that never got a name (sparse indices)
            tool_calls.retain(|tc| !tc.name.is_empty());
            let parsed_inputs: Vec<serde_json::Value> =
                tool_calls.iter().map(ToolCallAccumulator::parsed_input).collect();

            let mut content_blocks = Vec::new();
            if !text_content.is_empty() {
                content_blocks.push(ContentBlock::Text {
                    text: text_content.clone(),
                });
            }
            for (tc, input) in tool_calls.iter().zip(parsed_inputs.iter()) {
                content_blocks.push(ContentBlock::ToolUse {
                    id: tc.id.clone(),
                    name: tc.name.clone(),
                    input: input.clone(),
                });
            }

            let assistant_msg = ChatMessage {
                role: Role::Assistant,
                content: content_blocks,
                timestamp: Some(chrono::Utc::now()),
            };
            produced.push(assistant_msg.clone());
            messages.push(assistant_msg);

            self.event_bus.publish(AgentEvent::TurnComplete { turn });

            if tool_calls.is_empty() {
                if stop_reason == Some(StopReason::MaxTokens) {
                    warn!("LLM hit max tokens");
                }
                outcome.text = text_content;
                outcome.turns = turn + 1;

                self.store.append_messages(session_id, &produced).await?;

                info!(
                    turns = outcome.turns,
                    tool_calls = outcome.invocations.len(),
                    input_tokens = outcome.input_tokens,
                    output_tokens = outcome.output_tokens,
                    "Agent run complete"
                );
                self.event_bus.publish(AgentEvent::RunComplete {
                    session_id: session_id.clone(),
                    total_turns: outcome.turns,
                    input_tokens: outcome.input_tokens,
                    output_tokens: outcome.output_tokens,
                });
                return Ok(outcome);
            }

            // Publish all ToolStart events first (keeps ordering stable for listeners)
            for (tc, input) in tool_calls.iter().zip(parsed_inputs.iter()) {
                self.event_bus.publish(AgentEvent::ToolStart {
                    name: tc.name.clone(),
                    input: input.clone(),
                });
            }

            let results: Vec<ToolResult> =
                if self.config.agent.parallel_tools && tool_calls.len() > 1 {
                    let futs = tool_calls
                        .iter()
                        .zip(parsed_inputs.iter())
                        .map(|(tc, input)| {
                            Self::execute_tool(&self.tools, &tc.name, input.clone(), tool_ctx.clone())
                        });
                    futures::future::join_all(futs).await
                } else {
                    let mut results = Vec::with_capacity(tool_calls.len());
                    for (tc, input) in tool_calls.iter().zip(parsed_inputs.iter()) {
                        results.push(
                            Self::execute_tool(&self.tools, &tc.name, input.clone(), tool_ctx.clone())
                                .await,
                        );
                    }
                    results
                };

            let mut tool_result_blocks = Vec::with_capacity(results.len());
            for ((tc, input), result) in tool_calls.iter().zip(parsed_inputs).zip(results) {
                self.event_bus.publish(AgentEvent::ToolEnd {
                    name: tc.name.clone(),
                    result: result.clone(),
                });
                tool_result_blocks.push(ContentBlock::ToolResult {
                    tool_use_id: tc.id.clone(),
                    content: result.content.clone(),
                    is_error: result.is_error,
                });
                outcome.invocations.push(ToolInvocation {
                    name: tc.name.clone(),
                    input,
                    result,
                });
            }

            let results_msg = ChatMessage {
                role: Role::User,
                content: tool_result_blocks,
                timestamp: Some(chrono::Utc::now()),
            };
            produced.push(results_msg.clone());
            messages.push(results_msg);
        }

        Err(AcisError::MaxTurnsExceeded(max_turns))
    }
}
