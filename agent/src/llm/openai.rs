//! OpenAI-compatible chat completions client
//!
//! Talks plain HTTP to `{base_url}/chat/completions`, so the same client
//! works against OpenAI, Ollama's `/v1` endpoint, or any compatible server.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use super::{ChatMessage, ChatModel, ModelError, Role, ToolDefinition};
use crate::config::{ConfigError, LlmConfig};

/// Chat completions request body
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    tools: &'a [ToolDefinition],
    temperature: f32,
}

/// Chat completions response body (only the fields we read)
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

/// Client for an OpenAI-compatible endpoint
pub struct OpenAiClient {
    http_client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAiClient {
    /// Build a client, failing fast on a bad URL or missing credentials
    pub fn from_config(config: &LlmConfig) -> Result<Self, ConfigError> {
        let url = config.validate()?;
        let endpoint = format!("{}/chat/completions", url.as_str().trim_end_matches('/'));

        Ok(Self {
            http_client: reqwest::Client::new(),
            endpoint,
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            model: config.model.clone(),
        })
    }

    /// Full URL requests are sent to
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ChatModel for OpenAiClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<ChatMessage, ModelError> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages,
            tools,
            temperature: 0.0,
        };

        tracing::debug!(
            "Sending {} messages and {} tools to {}",
            messages.len(),
            tools.len(),
            self.model
        );

        let started = Instant::now();
        let mut builder = self.http_client.post(&self.endpoint).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder.send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Api { status, body });
        }

        let raw_body = response.text().await?;
        let parsed: ChatCompletionResponse = serde_json::from_str(&raw_body)?;
        tracing::debug!("Model responded in {}ms", started.elapsed().as_millis());

        let mut message = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or(ModelError::EmptyResponse)?;

        // Some servers omit or vary the role; history must record an assistant turn
        message.role = Role::Assistant;
        Ok(message)
    }

    fn model(&self) -> &str {
        &self.model
    }
}
