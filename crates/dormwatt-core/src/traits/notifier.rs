//! Notification channel strategy.

use async_trait::async_trait;

use crate::retry::{Outcome, RetryPolicy};
use crate::types::ChannelKind;

/// A formatted message ready for one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub title: String,
    pub content: String,
}

impl OutgoingMessage {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
        }
    }
}

/// One notification transport.
///
/// The dispatcher owns the retry loop; a channel only knows how to make a
/// single attempt against a single target and how to classify the result.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Which channel this is.
    fn kind(&self) -> ChannelKind;

    /// Attempt count and wait schedule, applied per target.
    fn retry_policy(&self) -> RetryPolicy;

    /// Independent delivery targets. Single-target channels return one entry.
    fn targets(&self) -> Vec<String>;

    /// When true a target that fails after retries is logged and skipped,
    /// and the send as a whole still succeeds.
    fn isolates_targets(&self) -> bool {
        false
    }

    /// Target as it may appear in logs.
    fn describe_target(&self, target: &str) -> String {
        target.to_string()
    }

    /// Make exactly one delivery attempt.
    async fn attempt(&self, target: &str, message: &OutgoingMessage) -> Outcome<()>;
}
