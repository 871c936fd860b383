use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use watchlist_core::{NarrativeFallback, ReportResult};

use crate::decode::decode_completion;
use crate::error::{ClientError, ClientResult};

#[derive(Debug, Clone, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

/// OpenAI-compatible chat-completion client used as the narrative fallback.
#[derive(Clone)]
pub struct ChatFallbackClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl ChatFallbackClient {
    pub fn new(
        base_url: String,
        api_key: String,
        model: String,
        temperature: f32,
        max_tokens: u32,
        timeout: Duration,
    ) -> ClientResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
            temperature,
            max_tokens,
        })
    }

    pub async fn chat(&self, prompt: &str) -> ClientResult<String> {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ClientError::ServiceUnavailable(format!(
                "chat completion returned {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        decode_completion(&body).ok_or_else(|| ClientError::EmptyPayload("chat completion".to_string()))
    }
}

#[async_trait]
impl NarrativeFallback for ChatFallbackClient {
    async fn complete(&self, prompt: &str) -> ReportResult<String> {
        Ok(self.chat(prompt).await?)
    }

    fn name(&self) -> &str {
        &self.model
    }
}
