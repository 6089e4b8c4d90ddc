use futures::future::BoxFuture;
use futures::stream::{BoxStream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use acis_core::config::ModelConfig;
use acis_core::error::{AcisError, Result};
use acis_core::traits::LlmClient;
use acis_core::types::*;

use crate::streaming::{SseEvent, SseStream};

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";
const COMPLETIONS_PATH: &str = "/chat/completions";

/// OpenAI chat-completions client. Also works with compatible servers
/// (Ollama, vLLM, Groq) through `base_url`.
pub struct OpenAiClient {
    http: Client,
}

impl OpenAiClient {
    pub fn new() -> Self {
        Self {
            http: Client::new(),
        }
    }
}

impl Default for OpenAiClient {
    fn default() -> Self {
        Self::new()
    }
}

// Request types
#[derive(Serialize)]
struct CompletionRequest {
    model: String,
    messages: Vec<OaiMessage>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream_options: Option<StreamOptions>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<OaiTool>,
}

#[derive(Serialize)]
struct StreamOptions {
    include_usage: bool,
}

#[derive(Serialize, Debug)]
pub(crate) struct OaiMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OaiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl OaiMessage {
    fn text(role: &str, content: String) -> Self {
        Self {
            role: role.to_string(),
            content: Some(content),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub(crate) struct OaiToolCall {
    #[serde(default)]
    index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    r#type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function: Option<OaiFunction>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub(crate) struct OaiFunction {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    arguments: Option<String>,
}

#[derive(Serialize)]
pub(crate) struct OaiTool {
    r#type: String,
    function: OaiToolDef,
}

#[derive(Serialize)]
pub(crate) struct OaiToolDef {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

// Response types
#[derive(Deserialize, Debug)]
struct StreamChunk {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<StreamUsage>,
}

#[derive(Deserialize, Debug)]
struct StreamChoice {
    #[serde(default)]
    delta: Option<StreamDeltaContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
struct StreamDeltaContent {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<OaiToolCall>>,
}

#[derive(Deserialize, Debug)]
struct StreamUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

/// Full completions URL for a configured base. Accepts either the complete
/// endpoint or an API root such as `http://localhost:11434/v1`.
pub(crate) fn endpoint(base_url: Option<&str>) -> String {
    match base_url.map(|u| u.trim_end_matches('/')) {
        None | Some("") => OPENAI_API_URL.to_string(),
        Some(url) if url.ends_with(COMPLETIONS_PATH) => url.to_string(),
        Some(url) => format!("{url}{COMPLETIONS_PATH}"),
    }
}

pub(crate) fn convert_tools(tools: &[ToolDefinition]) -> Vec<OaiTool> {
    tools
        .iter()
        .map(|t| OaiTool {
            r#type: "function".to_string(),
            function: OaiToolDef {
                name: t.name.clone(),
                description: t.description.clone(),
                parameters: t.input_schema.clone(),
            },
        })
        .collect()
}

pub(crate) fn convert_messages(messages: Vec<ChatMessage>) -> Vec<OaiMessage> {
    let mut oai_msgs = Vec::new();

    for msg in messages {
        match msg.role {
            Role::System => oai_msgs.push(OaiMessage::text("system", msg.text())),
            Role::User | Role::Tool => {
                let mut had_results = false;
                for block in &msg.content {
                    if let ContentBlock::ToolResult {
                        tool_use_id,
                        content,
                        ..
                    } = block
                    {
                        had_results = true;
                        oai_msgs.push(OaiMessage {
                            role: "tool".to_string(),
                            content: Some(content.clone()),
                            tool_calls: None,
                            tool_call_id: Some(tool_use_id.clone()),
                        });
                    }
                }
                if !had_results {
                    oai_msgs.push(OaiMessage::text("user", msg.text()));
                }
            }
            Role::Assistant => {
                let tool_uses = msg.tool_uses();
                if tool_uses.is_empty() {
                    oai_msgs.push(OaiMessage::text("assistant", msg.text()));
                    continue;
                }
                let calls: Vec<OaiToolCall> = tool_uses
                    .iter()
                    .enumerate()
                    .map(|(i, (id, name, input))| OaiToolCall {
                        index: i,
                        id: Some(id.to_string()),
                        r#type: Some("function".to_string()),
                        function: Some(OaiFunction {
                            name: Some(name.to_string()),
                            arguments: Some(input.to_string()),
                        }),
                    })
                    .collect();
                let text = msg.text();
                oai_msgs.push(OaiMessage {
                    role: "assistant".to_string(),
                    content: (!text.is_empty()).then_some(text),
                    tool_calls: Some(calls),
                    tool_call_id: None,
                });
            }
        }
    }

    oai_msgs
}

pub(crate) fn parse_chunk(event: SseEvent) -> Vec<Result<StreamDelta>> {
    if event.data.trim() == "[DONE]" {
        return vec![];
    }

    let chunk: StreamChunk = match serde_json::from_str(&event.data) {
        Ok(chunk) => chunk,
        Err(e) => {
            warn!(data = %event.data, error = %e, "Failed to parse OpenAI SSE chunk");
            return vec![];
        }
    };

    let mut deltas = Vec::new();

    if let Some(usage) = chunk.usage {
        deltas.push(Ok(StreamDelta::Usage {
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
        }));
    }

    let Some(choice) = chunk.choices.into_iter().next() else {
        return deltas;
    };

    if let Some(id) = chunk.id.filter(|id| !id.is_empty()) {
        debug!(message_id = %id, "Completion chunk");
    }

    let delta = choice.delta.unwrap_or_default();

    if let Some(text) = delta.content {
        if !text.is_empty() {
            deltas.push(Ok(StreamDelta::TextDelta(text)));
        }
    }

    // Some servers send the name and the full arguments in one chunk
    if let Some(tool_calls) = delta.tool_calls {
        for tc in tool_calls {
            let Some(func) = tc.function else { continue };
            if let Some(name) = func.name {
                deltas.push(Ok(StreamDelta::ToolUseStart {
                    index: tc.index,
                    id: tc.id.unwrap_or_default(),
                    name,
                }));
            }
            if let Some(args) = func.arguments {
                if !args.is_empty() {
                    deltas.push(Ok(StreamDelta::ToolInputDelta {
                        index: tc.index,
                        delta: args,
                    }));
                }
            }
        }
    }

    if let Some(reason) = choice.finish_reason {
        let stop = match reason.as_str() {
            "tool_calls" | "function_call" => StopReason::ToolUse,
            "length" => StopReason::MaxTokens,
            _ => StopReason::EndTurn,
        };
        deltas.push(Ok(StreamDelta::Stop(stop)));
    }

    deltas
}

impl LlmClient for OpenAiClient {
    fn chat_stream(
        &self,
        config: &ModelConfig,
        messages: Vec<ChatMessage>,
        tools: &[ToolDefinition],
    ) -> BoxFuture<'_, Result<BoxStream<'_, Result<StreamDelta>>>> {
        let config = config.clone();
        let tools = tools.to_vec();

        Box::pin(async move {
            let url = endpoint(config.base_url.as_deref());

            let body = CompletionRequest {
                model: config.model_id.clone(),
                messages: convert_messages(messages),
                max_tokens: config.max_tokens,
                temperature: (config.temperature >= 0.0).then_some(config.temperature),
                stream: true,
                // Usage frames are an OpenAI extension other servers may reject
                stream_options: config.base_url.is_none().then_some(StreamOptions {
                    include_usage: true,
                }),
                tools: convert_tools(&tools),
            };

            debug!(model = %body.model, url = %url, tools = body.tools.len(), "Sending chat request");

            let mut req = self.http.post(&url).json(&body);
            if let Some(api_key) = &config.api_key {
                req = req.bearer_auth(api_key);
            }

            let response = req
                .send()
                .await
                .map_err(|e| AcisError::LlmRequest(e.to_string()))?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "unknown".to_string());
                return Err(AcisError::LlmRequest(format!(
                    "HTTP {}: {}",
                    status.as_u16(),
                    body
                )));
            }

            let sse_stream = SseStream::new(response.bytes_stream());

            let delta_stream = sse_stream
                .map(|event| match event {
                    Ok(event) => futures::stream::iter(parse_chunk(event)),
                    Err(e) => futures::stream::iter(vec![Err(e)]),
                })
                .flatten();

            Ok(Box::pin(delta_stream) as BoxStream<'_, Result<StreamDelta>>)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data(raw: serde_json::Value) -> SseEvent {
        SseEvent {
            event_type: None,
            data: raw.to_string(),
        }
    }

    #[test]
    fn endpoint_accepts_roots_and_full_urls() {
        assert_eq!(endpoint(None), OPENAI_API_URL);
        assert_eq!(
            endpoint(Some("http://localhost:11434/v1/")),
            "http://localhost:11434/v1/chat/completions"
        );
        assert_eq!(
            endpoint(Some("https://proxy.local/v1/chat/completions")),
            "https://proxy.local/v1/chat/completions"
        );
    }

    #[test]
    fn tool_results_become_tool_messages() {
        let msgs = vec![
            ChatMessage::system("be helpful"),
            ChatMessage::user("My store ID is ABC123"),
            ChatMessage {
                role: Role::Assistant,
                content: vec![ContentBlock::ToolUse {
                    id: "call_1".into(),
                    name: "get_profile_and_team_name_by_store_id".into(),
                    input: json!({"store_id": "ABC123"}),
                }],
                timestamp: None,
            },
            ChatMessage::tool_result("call_1", "{\"team_name\":\"Alpha Team\"}", false),
        ];
        let converted = convert_messages(msgs);
        let roles: Vec<&str> = converted.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["system", "user", "assistant", "tool"]);

        let assistant = serde_json::to_value(&converted[2]).unwrap();
        assert!(assistant.get("content").is_none());
        assert_eq!(
            assistant["tool_calls"][0]["function"]["arguments"],
            "{\"store_id\":\"ABC123\"}"
        );
        assert_eq!(converted[3].tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn parses_text_delta() {
        let deltas = parse_chunk(data(json!({
            "id": "c1",
            "choices": [{"delta": {"content": "Hello"}, "finish_reason": null}]
        })));
        assert!(matches!(&deltas[..], [Ok(StreamDelta::TextDelta(t))] if t == "Hello"));
    }

    #[test]
    fn parses_tool_call_in_one_chunk() {
        let deltas = parse_chunk(data(json!({
            "choices": [{"delta": {"tool_calls": [{
                "index": 0,
                "id": "call_9",
                "type": "function",
                "function": {"name": "onboard_user", "arguments": "{\"store_id\":\"S1\"}"}
            }]}}]
        })));
        assert_eq!(deltas.len(), 2);
        assert!(matches!(
            &deltas[0],
            Ok(StreamDelta::ToolUseStart { index: 0, id, name }) if id == "call_9" && name == "onboard_user"
        ));
        assert!(matches!(&deltas[1], Ok(StreamDelta::ToolInputDelta { index: 0, .. })));
    }

    #[test]
    fn finish_reason_maps_to_stop() {
        let deltas = parse_chunk(data(json!({
            "choices": [{"delta": {}, "finish_reason": "tool_calls"}]
        })));
        assert!(matches!(&deltas[..], [Ok(StreamDelta::Stop(StopReason::ToolUse))]));
    }

    #[test]
    fn usage_frame_without_choices() {
        let deltas = parse_chunk(data(json!({
            "choices": [],
            "usage": {"prompt_tokens": 12, "completion_tokens": 5}
        })));
        assert!(matches!(
            &deltas[..],
            [Ok(StreamDelta::Usage { input_tokens: 12, output_tokens: 5 })]
        ));
    }

    #[test]
    fn done_and_garbage_yield_nothing() {
        let done = SseEvent {
            event_type: None,
            data: "[DONE]".into(),
        };
        assert!(parse_chunk(done).is_empty());
        let junk = SseEvent {
            event_type: None,
            data: "not json".into(),
        };
        assert!(parse_chunk(junk).is_empty());
    }
}
