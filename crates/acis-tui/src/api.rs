//! HTTP client for the orchestration server.

use std::time::Duration;

use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;

use acis_core::config::AppConfig;
use acis_core::error::{AcisError, Result};
use acis_core::onboarding::{ChatReply, ChatRequest, OnboardingState};
use acis_core::types::SessionId;

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
    chat_timeout: Duration,
    reset_timeout: Duration,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
            chat_timeout: Duration::from_secs(30),
            reset_timeout: Duration::from_secs(10),
        }
    }

    /// Client for the server described by the config.
    pub fn from_config(config: &AppConfig) -> Self {
        let mut client = Self::new(config.client_server_url())
            .with_timeouts(
                Duration::from_secs(config.client.chat_timeout_secs),
                Duration::from_secs(config.client.reset_timeout_secs),
            );
        client.token = config.server.token.clone().filter(|t| !t.is_empty());
        client
    }

    pub fn with_timeouts(mut self, chat: Duration, reset: Duration) -> Self {
        self.chat_timeout = chat;
        self.reset_timeout = reset;
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn send(&self, req: RequestBuilder) -> Result<Response> {
        let resp = self
            .authorize(req)
            .send()
            .await
            .map_err(|e| AcisError::Gateway(describe(&e)))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let body = resp.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(String::from))
            .unwrap_or(body);
        Err(AcisError::Gateway(format!("HTTP {}: {}", status.as_u16(), detail)))
    }

    async fn json<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T> {
        self.send(req)
            .await?
            .json()
            .await
            .map_err(|e| AcisError::Gateway(format!("Invalid response: {}", e)))
    }

    /// Send a chat message.
    pub async fn chat(&self, session_id: &SessionId, message: &str) -> Result<ChatReply> {
        let body = ChatRequest {
            message: message.to_string(),
            session_id: Some(session_id.0.clone()),
        };
        let req = self
            .http
            .post(self.url("/chat"))
            .timeout(self.chat_timeout)
            .json(&body);
        self.json(req).await
    }

    /// Fetch the saved state of a session.
    pub async fn state(&self, session_id: &SessionId) -> Result<OnboardingState> {
        let req = self
            .http
            .get(self.url(&format!("/session/{}/state", segment(session_id))))
            .timeout(self.reset_timeout);
        self.json(req).await
    }

    /// Clear a session on the server.
    pub async fn reset(&self, session_id: &SessionId) -> Result<()> {
        let req = self
            .http
            .delete(self.url(&format!("/session/{}", segment(session_id))))
            .timeout(self.reset_timeout);
        self.send(req).await.map(|_| ())
    }

    /// Server health payload.
    pub async fn health(&self) -> Result<serde_json::Value> {
        let req = self
            .http
            .get(self.url("/api/health"))
            .timeout(self.reset_timeout);
        self.json(req).await
    }
}

/// A session id as a single URL path segment.
fn segment(session_id: &SessionId) -> std::borrow::Cow<'_, str> {
    urlencoding::encode(&session_id.0)
}

fn describe(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        "Request timed out".to_string()
    } else if e.is_connect() {
        format!("Cannot reach server: {}", e)
    } else {
        e.to_string()
    }
}
