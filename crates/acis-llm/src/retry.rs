use std::time::Duration;

use futures::future::BoxFuture;
use futures::stream::BoxStream;
use tracing::warn;

use acis_core::config::{ModelConfig, RetryConfig};
use acis_core::error::{AcisError, Result};
use acis_core::traits::LlmClient;
use acis_core::types::*;

/// An LLM client that retries transient request failures with backoff.
pub struct RetryingClient {
    inner: Box<dyn LlmClient>,
    retry_config: RetryConfig,
}

impl RetryingClient {
    pub fn new(inner: Box<dyn LlmClient>, retry_config: RetryConfig) -> Self {
        Self {
            inner,
            retry_config,
        }
    }
}

/// HTTP status embedded in an `LlmRequest` message (`"HTTP 503: ..."`).
fn http_status(msg: &str) -> Option<u16> {
    msg.strip_prefix("HTTP ")?.split(':').next()?.trim().parse().ok()
}

pub(crate) fn is_retryable(e: &AcisError) -> bool {
    match e {
        AcisError::LlmRequest(msg) => match http_status(msg) {
            Some(status) => status == 429 || (500..600).contains(&status),
            None => {
                let msg = msg.to_lowercase();
                msg.contains("timeout") || msg.contains("timed out") || msg.contains("connect")
            }
        },
        AcisError::LlmStream(_) => true,
        _ => false,
    }
}

pub(crate) fn calculate_backoff(attempt: u32, config: &RetryConfig) -> Duration {
    let ms = config
        .initial_backoff_ms
        .saturating_mul(2u64.saturating_pow(attempt))
        .min(config.max_backoff_ms);
    // Jitter: 0.8x to 1.2x
    let jitter = 0.8 + rand::random::<f64>() * 0.4;
    Duration::from_millis((ms as f64 * jitter) as u64)
}

impl LlmClient for RetryingClient {
    fn chat_stream(
        &self,
        config: &ModelConfig,
        messages: Vec<ChatMessage>,
        tools: &[ToolDefinition],
    ) -> BoxFuture<'_, Result<BoxStream<'_, Result<StreamDelta>>>> {
        let config = config.clone();
        let tools = tools.to_vec();

        Box::pin(async move {
            let max_retries = self.retry_config.max_retries;
            let mut attempt = 0;
            loop {
                match self.inner.chat_stream(&config, messages.clone(), &tools).await {
                    Ok(stream) => return Ok(stream),
                    Err(e) if is_retryable(&e) && attempt < max_retries => {
                        let backoff = calculate_backoff(attempt, &self.retry_config);
                        warn!(
                            attempt = attempt + 1,
                            max_retries,
                            backoff_ms = backoff.as_millis() as u64,
                            error = %e,
                            "Retrying LLM request"
                        );
                        tokio::time::sleep(backoff).await;
                        attempt += 1;
                    }
                    Err(e) => return Err(e),
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use acis_test_utils::ScriptedLlm;

    #[test]
    fn status_codes_drive_retryability() {
        assert!(is_retryable(&AcisError::LlmRequest("HTTP 429: slow down".into())));
        assert!(is_retryable(&AcisError::LlmRequest("HTTP 503: busy".into())));
        assert!(!is_retryable(&AcisError::LlmRequest("HTTP 401: bad key".into())));
        assert!(!is_retryable(&AcisError::LlmRequest("HTTP 400: 500 tokens max".into())));
        assert!(is_retryable(&AcisError::LlmRequest("error trying to connect".into())));
        assert!(is_retryable(&AcisError::LlmStream("reset".into())));
        assert!(!is_retryable(&AcisError::Config("x".into())));
    }

    #[test]
    fn backoff_is_capped() {
        let config = RetryConfig {
            max_retries: 10,
            initial_backoff_ms: 1000,
            max_backoff_ms: 4000,
        };
        let late = calculate_backoff(8, &config);
        assert!(late <= Duration::from_millis(4800));
        assert!(late >= Duration::from_millis(3200));
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_success() {
        let inner = ScriptedLlm::new()
            .fail_with(AcisError::LlmRequest("HTTP 502: bad gateway".into()))
            .then_text("recovered");
        let calls = inner.call_counter();
        let client = RetryingClient::new(Box::new(inner), RetryConfig::default());

        let text = crate::complete_text(&client, &ModelConfig::default(), vec![ChatMessage::user("hi")])
            .await
            .unwrap();
        assert_eq!(text, "recovered");
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_errors_are_not_retried() {
        let inner = ScriptedLlm::new()
            .fail_with(AcisError::LlmRequest("HTTP 401: unauthorized".into()))
            .then_text("never");
        let calls = inner.call_counter();
        let client = RetryingClient::new(Box::new(inner), RetryConfig::default());

        let err = crate::complete_text(&client, &ModelConfig::default(), vec![ChatMessage::user("hi")])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("401"));
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
