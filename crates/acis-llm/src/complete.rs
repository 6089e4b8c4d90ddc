use futures::StreamExt;

use acis_core::config::ModelConfig;
use acis_core::error::Result;
use acis_core::traits::LlmClient;
use acis_core::types::{ChatMessage, StreamDelta};

/// Run a tool-less completion and collect the streamed text.
pub async fn complete_text(
    llm: &dyn LlmClient,
    config: &ModelConfig,
    messages: Vec<ChatMessage>,
) -> Result<String> {
    let mut stream = llm.chat_stream(config, messages, &[]).await?;
    let mut text = String::new();
    while let Some(delta) = stream.next().await {
        if let StreamDelta::TextDelta(chunk) = delta? {
            text.push_str(&chunk);
        }
    }
    Ok(text)
}
