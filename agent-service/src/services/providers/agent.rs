//! OpenAI-compatible chat completions client (Ollama, vLLM, ...).

use super::{AgentRuntime, ProviderError};
use crate::config::AgentRuntimeConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub struct ChatAgent {
    client: Client,
    endpoint: String,
    model: String,
    system_prompt: String,
}

impl ChatAgent {
    pub fn new(config: &AgentRuntimeConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: format!(
                "{}/chat/completions",
                config.base_url.as_str().trim_end_matches('/')
            ),
            model: config.model.clone(),
            system_prompt: config.system_prompt.clone(),
        })
    }

    fn request<'a>(&'a self, prompt: &'a str) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: vec![
                Message {
                    role: "system",
                    content: &self.system_prompt,
                },
                Message {
                    role: "user",
                    content: prompt,
                },
            ],
            stream: false,
        }
    }
}

#[async_trait]
impl AgentRuntime for ChatAgent {
    async fn run(&self, prompt: &str) -> Result<String, ProviderError> {
        tracing::debug!(model = %self.model, prompt_len = prompt.len(), "Sending chat completion");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&self.request(prompt))
            .send()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();

            if status.as_u16() == 429 {
                return Err(ProviderError::RateLimited);
            }

            return Err(ProviderError::ApiError(format!(
                "chat completion failed {}: {}",
                status, error_text
            )));
        }

        let completion: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ApiError(format!("Failed to parse response: {}", e)))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .ok_or(ProviderError::EmptyResponse)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}
