use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use crate::error::{InspectorError, Result};
use crate::models::{ChatRequest, ChatResponse};

/// Chat-completions transport shared by the vision, cross-check and
/// allergy-inference clients.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse>;
}

/// OpenAI-compatible HTTP transport. Single attempt per call.
pub struct HttpTransport {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl HttpTransport {
    pub fn new(base_url: &str, api_key: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse> {
        tracing::debug!(model = %req.model, endpoint = %self.endpoint, "Sending chat request");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(req)
            .send()
            .await
            .map_err(|e| {
                InspectorError::Transport(format!("Failed to send request to {}: {e}", self.endpoint))
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(InspectorError::Api { status, body });
        }

        response.json().await.map_err(|e| {
            InspectorError::Transport(format!("Failed to parse chat completion response: {e}"))
        })
    }
}
