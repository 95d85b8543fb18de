//! ServerChan push relay: one send per configured key.
//!
//! Keys are independent targets: a key that fails is logged and the next key
//! is still tried. Transport errors and 5xx responses are retried per key; a
//! body that is not JSON, or a JSON body with a non-zero `code`, fails that
//! key immediately.

use async_trait::async_trait;
use dormwatt_core::config::ServerChanConfig;
use dormwatt_core::error::DormwattError;
use dormwatt_core::retry::{Outcome, RetryPolicy};
use dormwatt_core::traits::{Notifier, OutgoingMessage};
use dormwatt_core::types::ChannelKind;
use serde::Deserialize;
use std::time::Duration;

use crate::{HTTP_TIMEOUT, truncate};

/// ServerChan API reply.
#[derive(Debug, Deserialize)]
struct ServerChanResponse {
    code: i64,
    #[serde(default)]
    message: Option<String>,
}

pub struct ServerChanNotifier {
    client: reqwest::Client,
    api_base: String,
    keys: Vec<String>,
    policy: RetryPolicy,
}

impl ServerChanNotifier {
    /// Default policy: 3 attempts per key, waiting 15s then 30s.
    pub fn default_policy() -> RetryPolicy {
        RetryPolicy::exponential(3, Duration::from_secs(15))
    }

    pub fn new(api_base: &str, keys: Vec<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            keys,
            policy: Self::default_policy(),
        }
    }

    /// `None` when no key is configured.
    pub fn from_config(config: &ServerChanConfig) -> Option<Self> {
        if !config.is_configured() {
            return None;
        }
        Some(Self::new(&config.api_base, config.key_list()))
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    fn send_url(&self, key: &str) -> String {
        format!("{}/{}.send", self.api_base, key)
    }
}

/// Keys are credentials; only a short prefix goes to logs.
pub fn mask_key(key: &str) -> String {
    let prefix: String = key.chars().take(6).collect();
    if prefix.len() < key.len() {
        format!("{prefix}***")
    } else {
        "***".to_string()
    }
}

#[async_trait]
impl Notifier for ServerChanNotifier {
    fn kind(&self) -> ChannelKind {
        ChannelKind::PushRelay
    }

    fn retry_policy(&self) -> RetryPolicy {
        self.policy
    }

    fn targets(&self) -> Vec<String> {
        self.keys.clone()
    }

    fn isolates_targets(&self) -> bool {
        true
    }

    fn describe_target(&self, target: &str) -> String {
        mask_key(target)
    }

    async fn attempt(&self, key: &str, message: &OutgoingMessage) -> Outcome<()> {
        let response = match self
            .client
            .post(self.send_url(key))
            .form(&[
                ("title", message.title.as_str()),
                ("desp", message.content.as_str()),
            ])
            .timeout(HTTP_TIMEOUT)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                return Outcome::RetryableFailure(DormwattError::Channel(format!(
                    "ServerChan request failed: {e}"
                )));
            }
        };

        let status = response.status();
        if status.is_server_error() {
            return Outcome::RetryableFailure(DormwattError::Channel(format!(
                "ServerChan HTTP {status}"
            )));
        }

        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => {
                return Outcome::RetryableFailure(DormwattError::Channel(format!(
                    "ServerChan body read failed: {e}"
                )));
            }
        };

        let reply: ServerChanResponse = match serde_json::from_str(&text) {
            Ok(reply) => reply,
            Err(_) => {
                return Outcome::TerminalFailure(DormwattError::Channel(format!(
                    "ServerChan returned non-JSON: {}",
                    truncate(&text, 200)
                )));
            }
        };

        if reply.code == 0 {
            Outcome::Success(())
        } else {
            Outcome::TerminalFailure(DormwattError::Channel(format!(
                "ServerChan rejected message (code {}): {}",
                reply.code,
                reply.message.unwrap_or_default()
            )))
        }
    }
}
