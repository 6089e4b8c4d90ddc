//! Test doubles shared across the workspace.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use futures::stream::BoxStream;

use acis_core::config::{AppConfig, ModelConfig};
use acis_core::error::{AcisError, Result};
use acis_core::traits::LlmClient;
use acis_core::types::{ChatMessage, StopReason, StreamDelta, ToolDefinition};

enum Step {
    Reply(Vec<std::result::Result<StreamDelta, String>>),
    Fail(AcisError),
}

/// A request the scripted client received.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<String>,
}

impl RecordedRequest {
    /// Text of the system message, if any.
    pub fn system_text(&self) -> String {
        self.messages
            .iter()
            .filter(|m| m.role == acis_core::types::Role::System)
            .map(ChatMessage::text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// LLM client that replays a fixed script, one step per request.
/// Requests past the end of the script fail with `LlmRequest`.
#[derive(Default)]
pub struct ScriptedLlm {
    script: Mutex<VecDeque<Step>>,
    calls: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(self, step: Step) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(step);
        }
        self
    }

    /// Reply with a single text chunk and end the turn.
    pub fn then_text(self, text: &str) -> Self {
        self.then_text_chunks(&[text])
    }

    /// Reply with several text chunks and end the turn.
    pub fn then_text_chunks(self, chunks: &[&str]) -> Self {
        let mut deltas: Vec<_> = chunks
            .iter()
            .map(|c| Ok(StreamDelta::TextDelta(c.to_string())))
            .collect();
        deltas.push(Ok(StreamDelta::Usage {
            input_tokens: 10,
            output_tokens: 5,
        }));
        deltas.push(Ok(StreamDelta::Stop(StopReason::EndTurn)));
        self.push(Step::Reply(deltas))
    }

    /// Reply with one tool call.
    pub fn then_tool_call(self, id: &str, name: &str, input: serde_json::Value) -> Self {
        self.then_tool_calls(&[(id, name, input)])
    }

    /// Reply with several tool calls in one turn.
    pub fn then_tool_calls(self, calls: &[(&str, &str, serde_json::Value)]) -> Self {
        let mut deltas = Vec::new();
        for (index, (id, name, input)) in calls.iter().enumerate() {
            deltas.push(Ok(StreamDelta::ToolUseStart {
                index,
                id: id.to_string(),
                name: name.to_string(),
            }));
            deltas.push(Ok(StreamDelta::ToolInputDelta {
                index,
                delta: input.to_string(),
            }));
        }
        deltas.push(Ok(StreamDelta::Stop(StopReason::ToolUse)));
        self.push(Step::Reply(deltas))
    }

    /// Reply with raw deltas.
    pub fn then_deltas(self, deltas: Vec<StreamDelta>) -> Self {
        self.push(Step::Reply(deltas.into_iter().map(Ok).collect()))
    }

    /// Start a reply, then fail mid-stream.
    pub fn then_stream_error(self, message: &str) -> Self {
        self.push(Step::Reply(vec![
            Ok(StreamDelta::TextDelta("partial".into())),
            Err(message.to_string()),
        ]))
    }

    /// Fail the request itself.
    pub fn fail_with(self, error: AcisError) -> Self {
        self.push(Step::Fail(error))
    }

    /// Shared counter of requests received.
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }

    /// Shared log of requests received.
    pub fn request_log(&self) -> Arc<Mutex<Vec<RecordedRequest>>> {
        self.requests.clone()
    }

    /// Steps not yet consumed.
    pub fn remaining(&self) -> usize {
        self.script.lock().map(|s| s.len()).unwrap_or(0)
    }
}

impl LlmClient for ScriptedLlm {
    fn chat_stream(
        &self,
        _config: &ModelConfig,
        messages: Vec<ChatMessage>,
        tools: &[ToolDefinition],
    ) -> BoxFuture<'_, Result<BoxStream<'_, Result<StreamDelta>>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut log) = self.requests.lock() {
            log.push(RecordedRequest {
                messages,
                tools: tools.iter().map(|t| t.name.clone()).collect(),
            });
        }
        let step = self.script.lock().ok().and_then(|mut s| s.pop_front());

        Box::pin(async move {
            match step {
                Some(Step::Reply(deltas)) => {
                    let items: Vec<Result<StreamDelta>> = deltas
                        .into_iter()
                        .map(|d| d.map_err(AcisError::LlmStream))
                        .collect();
                    Ok(Box::pin(futures::stream::iter(items)) as BoxStream<'_, Result<StreamDelta>>)
                }
                Some(Step::Fail(e)) => Err(e),
                None => Err(AcisError::LlmRequest("script exhausted".into())),
            }
        })
    }
}

/// Config suitable for tests: a fake API key and no extraction retries.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.model.api_key = Some("sk-test".into());
    config.agent.max_turns = 6;
    config.agent.max_duration_secs = 30;
    config
}

/// Write a TOML config into a temp dir and return both.
pub fn write_config(contents: &str) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("acis.toml");
    std::fs::write(&path, contents).expect("write config");
    (dir, path)
}

/// Sanity-check a TOML snippet parses into `AppConfig`.
pub fn parse_config(contents: &str) -> AppConfig {
    toml::from_str(contents).expect("valid config")
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn replays_steps_in_order() {
        let llm = ScriptedLlm::new()
            .then_tool_call("c1", "onboard_user", serde_json::json!({}))
            .then_text("done");
        let config = ModelConfig::default();

        let first: Vec<_> = llm
            .chat_stream(&config, vec![], &[])
            .await
            .unwrap()
            .collect()
            .await;
        assert!(matches!(first[0], Ok(StreamDelta::ToolUseStart { .. })));

        let second: Vec<_> = llm
            .chat_stream(&config, vec![], &[])
            .await
            .unwrap()
            .collect()
            .await;
        assert!(matches!(&second[0], Ok(StreamDelta::TextDelta(t)) if t == "done"));

        assert!(llm.chat_stream(&config, vec![], &[]).await.is_err());
        assert_eq!(llm.call_counter().load(Ordering::SeqCst), 3);
        assert_eq!(llm.remaining(), 0);
    }
}
