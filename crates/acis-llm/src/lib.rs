pub mod complete;
pub mod providers;
pub mod retry;
pub mod streaming;

use acis_core::config::ModelConfig;
use acis_core::error::{AcisError, Result};
use acis_core::traits::LlmClient;

pub use complete::complete_text;
pub use providers::openai::OpenAiClient;
pub use retry::RetryingClient;

/// Create an LLM client for the configured provider.
pub fn create_client(config: &ModelConfig) -> Result<Box<dyn LlmClient>> {
    match config.provider.as_str() {
        // All of these speak the OpenAI chat-completions dialect
        "openai" | "openai-compatible" | "ollama" | "vllm" | "groq" => {
            Ok(Box::new(OpenAiClient::new()))
        }
        other => Err(AcisError::UnsupportedProvider(other.to_string())),
    }
}

/// Create a client, wrapped with retries when `[model.retry]` is set.
pub fn build_client(config: &ModelConfig) -> Result<Box<dyn LlmClient>> {
    let client = create_client(config)?;
    Ok(match &config.retry {
        Some(retry) => Box::new(RetryingClient::new(client, retry.clone())),
        None => client,
    })
}
