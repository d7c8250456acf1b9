//! OpenAI-compatible chat completion client
//!
//! Works against any `/chat/completions` endpoint that accepts a bearer key
//! (NVIDIA NIM, OpenRouter). Reasoning models may wrap their thinking in
//! `<think>` blocks; those are stripped before the text is returned.

use super::{body_excerpt, USER_AGENT};
use crate::config::CompletionConfig;
use crate::services::{ChatMessage, CompletionProvider, UpstreamError};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

static THINK_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<think>.*?</think>").expect("think pattern is valid"));

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct ChatCompletionClient {
    http_client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl ChatCompletionClient {
    pub fn new(config: &CompletionConfig) -> Result<Self, UpstreamError> {
        let http_client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| UpstreamError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
            model: config.model.trim().to_string(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    async fn post(&self, model: &str, messages: &[ChatMessage]) -> Result<String, UpstreamError> {
        let Some(api_key) = &self.api_key else {
            return Err(UpstreamError::NotConfigured("completion api key".to_string()));
        };

        let url = format!("{}/chat/completions", self.base_url);
        debug!(model, messages = messages.len(), "Requesting chat completion");

        let body = ChatRequest {
            model,
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| UpstreamError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Api(status.as_u16(), body_excerpt(&text)));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| UpstreamError::Decode(e.to_string()))?;

        extract_content(parsed)
    }
}

fn extract_content(response: ChatResponse) -> Result<String, UpstreamError> {
    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| UpstreamError::Empty("no choices in completion".to_string()))?;

    let cleaned = strip_reasoning(&content);
    if cleaned.is_empty() {
        return Err(UpstreamError::Empty("completion content is blank".to_string()));
    }
    Ok(cleaned)
}

fn strip_reasoning(content: &str) -> String {
    THINK_BLOCK.replace_all(content, "").trim().to_string()
}

#[async_trait]
impl CompletionProvider for ChatCompletionClient {
    fn is_configured(&self) -> bool {
        self.api_key.is_some() && !self.model.is_empty()
    }

    fn default_model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, UpstreamError> {
        self.post(&self.model, messages).await
    }

    async fn complete_with_model(
        &self,
        model: &str,
        messages: &[ChatMessage],
    ) -> Result<String, UpstreamError> {
        self.post(model, messages).await
    }
}
