//! Delivery of finished reports to a chat webhook.
use crate::error::NotifyError;
use crate::types::truncate_chars;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{info, warn};

/// Maximum number of report characters relayed to the webhook.
pub const MAX_NOTIFICATION_LENGTH: usize = 5000;

pub const DEFAULT_TITLE: &str = "[Log analysis] Today's errors";

#[async_trait]
pub trait Notifier {
    async fn notify(&self, text: &str) -> Result<(), NotifyError>;
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    text: &'a str,
}

/// Posts `{ "text": ... }` to an incoming-webhook URL.
pub struct WebhookNotifier {
    client: Client,
    url: String,
    title: String,
}

impl WebhookNotifier {
    pub fn new(client: Client, url: &str, title: &str) -> Self {
        Self {
            client,
            url: url.to_string(),
            title: title.to_string(),
        }
    }

    /// Formats the message body: the title line, a blank line, then the report
    /// cut to `MAX_NOTIFICATION_LENGTH` characters with `...` when shortened.
    pub fn format_message(&self, report: &str) -> String {
        let body = truncate_chars(report, MAX_NOTIFICATION_LENGTH);
        let ellipsis = if body.len() < report.len() { "..." } else { "" };
        format!("{}\n\n{}{}", self.title, body, ellipsis)
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, text: &str) -> Result<(), NotifyError> {
        let message = self.format_message(text);
        let response = self
            .client
            .post(&self.url)
            .json(&WebhookPayload { text: &message })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected(format!("{status}: {body}")));
        }

        info!(chars = message.chars().count(), "Report delivered to webhook");
        Ok(())
    }
}

/// Used when no webhook is configured.
pub struct DisabledNotifier;

#[async_trait]
impl Notifier for DisabledNotifier {
    async fn notify(&self, _text: &str) -> Result<(), NotifyError> {
        warn!("No webhook configured, report not relayed");
        Ok(())
    }
}
