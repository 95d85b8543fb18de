//! Telegram Bot channel: `sendMessage` with MarkdownV2 text.
//!
//! Every failure here is worth another try: transport errors, non-JSON
//! replies and `ok: false` acknowledgments all come back as retryable.

use async_trait::async_trait;
use dormwatt_core::config::TelegramChannelConfig;
use dormwatt_core::error::DormwattError;
use dormwatt_core::retry::{Outcome, RetryPolicy};
use dormwatt_core::traits::{Notifier, OutgoingMessage};
use dormwatt_core::types::ChannelKind;
use serde::Deserialize;
use std::time::Duration;

use crate::{HTTP_TIMEOUT, truncate};

/// Telegram channel.
pub struct TelegramNotifier {
    client: reqwest::Client,
    api_base: String,
    bot_token: String,
    chat_id: String,
    policy: RetryPolicy,
}

impl TelegramNotifier {
    /// Default policy: 5 attempts, 10s apart.
    pub fn default_policy() -> RetryPolicy {
        RetryPolicy::fixed(5, Duration::from_secs(10))
    }

    pub fn new(api_base: &str, bot_token: &str, chat_id: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            bot_token: bot_token.to_string(),
            chat_id: chat_id.to_string(),
            policy: Self::default_policy(),
        }
    }

    /// `None` unless both token and chat id are set.
    pub fn from_config(config: &TelegramChannelConfig) -> Option<Self> {
        if !config.is_configured() {
            return None;
        }
        Some(Self::new(&config.api_base, &config.bot_token, &config.chat_id))
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.bot_token, method)
    }

    /// Bold title, blank line, content. Content must already be escaped.
    pub fn render_text(message: &OutgoingMessage) -> String {
        format!("*{}*\n\n{}", message.title, message.content)
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    fn kind(&self) -> ChannelKind {
        ChannelKind::ChatBot
    }

    fn retry_policy(&self) -> RetryPolicy {
        self.policy
    }

    fn targets(&self) -> Vec<String> {
        vec![self.chat_id.clone()]
    }

    async fn attempt(&self, chat_id: &str, message: &OutgoingMessage) -> Outcome<()> {
        let body = serde_json::json!({
            "chat_id": chat_id,
            "text": Self::render_text(message),
            "parse_mode": "MarkdownV2",
        });

        let response = match self
            .client
            .post(self.api_url("sendMessage"))
            .json(&body)
            .timeout(HTTP_TIMEOUT)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                return Outcome::RetryableFailure(DormwattError::Channel(format!(
                    "sendMessage failed: {e}"
                )));
            }
        };

        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => {
                return Outcome::RetryableFailure(DormwattError::Channel(format!(
                    "sendMessage body read failed: {e}"
                )));
            }
        };

        let result: TelegramApiResponse<serde_json::Value> = match serde_json::from_str(&text) {
            Ok(result) => result,
            Err(_) => {
                tracing::error!("Telegram returned non-JSON: {}", truncate(&text, 200));
                return Outcome::RetryableFailure(DormwattError::Channel(
                    "Telegram returned non-JSON".into(),
                ));
            }
        };

        if result.ok {
            Outcome::Success(())
        } else {
            Outcome::RetryableFailure(DormwattError::Channel(format!(
                "Send failed: {}",
                result.description.unwrap_or_default()
            )))
        }
    }
}

// --- Telegram API Types ---

#[derive(Debug, Deserialize)]
pub struct TelegramApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
}
