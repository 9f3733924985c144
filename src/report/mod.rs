//! Requests an analysis report for an annotated log batch from a
//! chat-completion endpoint.
mod models;
pub mod prompt;

use crate::error::ReportError;
use crate::types::AnnotatedLog;
use async_trait::async_trait;
use models::{ChatRequest, ChatResponse};
use reqwest::Client;

pub const DEFAULT_API_VERSION: &str = "2024-05-01-preview";

#[async_trait]
pub trait Summarizer {
    /// Produces the report text for a batch.
    ///
    /// `Ok(None)` means the service answered but produced no text.
    async fn summarize(&self, logs: &[AnnotatedLog]) -> Result<Option<String>, ReportError>;
}

#[derive(Clone, Debug)]
pub struct ChatCompletionConfig {
    pub endpoint: String,
    pub deployment: String,
    pub api_key: String,
    pub api_version: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
}

impl ChatCompletionConfig {
    pub fn url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.endpoint.trim_end_matches('/'),
            self.deployment,
            self.api_version
        )
    }
}

pub struct ChatCompletionSummarizer {
    client: Client,
    config: ChatCompletionConfig,
}

impl ChatCompletionSummarizer {
    pub fn new(client: Client, config: ChatCompletionConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl Summarizer for ChatCompletionSummarizer {
    async fn summarize(&self, logs: &[AnnotatedLog]) -> Result<Option<String>, ReportError> {
        let log_content = serde_json::to_string_pretty(logs)?;
        let request = ChatRequest {
            messages: prompt::build_messages(&log_content),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            top_p: self.config.top_p,
        };

        let response = self
            .client
            .post(self.config.url())
            .header("api-key", &self.config.api_key)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(%status, %body, "Chat completion API error");
            return Err(ReportError::Api(format!("{status}: {body}")));
        }

        let response = response.json::<ChatResponse>().await?;

        if let Some(error) = response.error {
            return Err(ReportError::Api(error.message));
        }

        Ok(response.first_text())
    }
}
