//! SMTP email channel (async lettre, implicit TLS).
//!
//! The configured address is both sender and recipient. A malformed address
//! or message fails at once; anything that goes wrong on the wire is retried.

use async_trait::async_trait;
use dormwatt_core::config::EmailChannelConfig;
use dormwatt_core::error::{DormwattError, Result};
use dormwatt_core::retry::{Outcome, RetryPolicy};
use dormwatt_core::traits::{Notifier, OutgoingMessage};
use dormwatt_core::types::ChannelKind;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;

const SMTP_TIMEOUT: Duration = Duration::from_secs(30);

pub struct EmailNotifier {
    address: String,
    smtp_code: String,
    smtp_server: String,
    smtp_port: u16,
    policy: RetryPolicy,
}

impl EmailNotifier {
    /// Default policy: 3 attempts, waiting 15s then 30s.
    pub fn default_policy() -> RetryPolicy {
        RetryPolicy::exponential(3, Duration::from_secs(15))
    }

    /// `None` unless address, code and server are all set.
    pub fn from_config(config: &EmailChannelConfig) -> Option<Self> {
        if !config.is_configured() {
            return None;
        }
        Some(Self {
            address: config.address.clone(),
            smtp_code: config.smtp_code.clone(),
            smtp_server: config.smtp_server.clone(),
            smtp_port: config.smtp_port,
            policy: Self::default_policy(),
        })
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Plain-text UTF-8 message from the address to itself.
    pub fn build_message(&self, to: &str, message: &OutgoingMessage) -> Result<Message> {
        let from: Mailbox = self
            .address
            .parse()
            .map_err(|e| DormwattError::Config(format!("Invalid from: {e}")))?;
        let to: Mailbox = to
            .parse()
            .map_err(|e| DormwattError::Config(format!("Invalid to: {e}")))?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(message.title.as_str())
            .header(ContentType::TEXT_PLAIN)
            .body(message.content.clone())
            .map_err(|e| DormwattError::Channel(format!("Build email: {e}")))
    }

    fn transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
        let creds = Credentials::new(self.address.clone(), self.smtp_code.clone());
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&self.smtp_server)
            .map_err(|e| DormwattError::Config(format!("SMTP relay: {e}")))?
            .port(self.smtp_port)
            .credentials(creds)
            .timeout(Some(SMTP_TIMEOUT))
            .build();
        Ok(mailer)
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Email
    }

    fn retry_policy(&self) -> RetryPolicy {
        self.policy
    }

    fn targets(&self) -> Vec<String> {
        vec![self.address.clone()]
    }

    async fn attempt(&self, to: &str, message: &OutgoingMessage) -> Outcome<()> {
        let email = match self.build_message(to, message) {
            Ok(email) => email,
            Err(e) => return Outcome::TerminalFailure(e),
        };
        let mailer = match self.transport() {
            Ok(mailer) => mailer,
            Err(e) => return Outcome::TerminalFailure(e),
        };

        match mailer.send(email).await {
            Ok(_) => {
                tracing::info!("📤 Email sent to: {to}");
                Outcome::Success(())
            }
            Err(e) => Outcome::RetryableFailure(DormwattError::Channel(format!("SMTP send: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(address: &str) -> EmailChannelConfig {
        EmailChannelConfig {
            address: address.into(),
            smtp_code: "authcode".into(),
            smtp_server: "127.0.0.1".into(),
            smtp_port: 1,
        }
    }

    #[test]
    fn test_from_config_requires_all_fields() {
        assert!(EmailNotifier::from_config(&EmailChannelConfig::default()).is_none());
        let partial = EmailChannelConfig {
            address: "me@example.com".into(),
            smtp_server: "smtp.example.com".into(),
            ..Default::default()
        };
        assert!(EmailNotifier::from_config(&partial).is_none());

        let n = EmailNotifier::from_config(&config("me@example.com")).unwrap();
        assert_eq!(n.targets(), vec!["me@example.com"]);
        assert_eq!(n.kind(), ChannelKind::Email);
    }

    #[test]
    fn test_build_message_headers() {
        let n = EmailNotifier::from_config(&config("me@example.com")).unwrap();
        let msg = OutgoingMessage::new("Dorm energy report", "💡 Lighting balance: 12.5 kWh");
        let email = n.build_message("me@example.com", &msg).unwrap();
        let raw = String::from_utf8(email.formatted()).unwrap();
        assert!(raw.contains("From: me@example.com"));
        assert!(raw.contains("To: me@example.com"));
        assert!(raw.contains("Subject: Dorm energy report"));
        assert!(raw.contains("text/plain"));
    }

    #[tokio::test]
    async fn test_invalid_address_is_terminal() {
        let n = EmailNotifier::from_config(&config("not an address")).unwrap();
        let msg = OutgoingMessage::new("t", "c");
        assert!(matches!(
            n.attempt("not an address", &msg).await,
            Outcome::TerminalFailure(_)
        ));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_retryable() {
        let n = EmailNotifier::from_config(&config("me@example.com")).unwrap();
        let msg = OutgoingMessage::new("t", "c");
        assert!(matches!(
            n.attempt("me@example.com", &msg).await,
            Outcome::RetryableFailure(_)
        ));
    }
}
