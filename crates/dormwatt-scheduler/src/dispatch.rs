//! Notification dispatch: sends a reading to every configured channel.
//!
//! Each channel runs its own retry loop. A channel that ends in failure is
//! logged and reported, never propagated to its siblings or to the caller.

use std::sync::Arc;

use dormwatt_channels::{EmailNotifier, ServerChanNotifier, TelegramNotifier};
use dormwatt_core::config::ChannelConfig;
use dormwatt_core::error::Result;
use dormwatt_core::traits::{Notifier, OutgoingMessage};
use dormwatt_core::types::{ChannelKind, Reading};

use crate::notify::{self, ChannelOutcome, ChannelReport, DispatchReport, TargetResult};

/// Holds at most one notifier per channel kind. Cheap to clone.
#[derive(Clone, Default)]
pub struct NotificationDispatcher {
    push_relay: Option<Arc<dyn Notifier>>,
    email: Option<Arc<dyn Notifier>>,
    chat_bot: Option<Arc<dyn Notifier>>,
}

impl NotificationDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build every channel whose configuration is present.
    pub fn from_config(config: &ChannelConfig) -> Self {
        let mut dispatcher = Self::new();
        if let Some(n) = ServerChanNotifier::from_config(&config.serverchan) {
            dispatcher = dispatcher.with_notifier(Arc::new(n));
        }
        if let Some(n) = EmailNotifier::from_config(&config.email) {
            dispatcher = dispatcher.with_notifier(Arc::new(n));
        }
        if let Some(n) = TelegramNotifier::from_config(&config.telegram) {
            dispatcher = dispatcher.with_notifier(Arc::new(n));
        }
        dispatcher
    }

    /// Install `notifier` in the slot for its kind, replacing any previous one.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        let kind = notifier.kind();
        *self.slot_mut(kind) = Some(notifier);
        self
    }

    fn slot(&self, kind: ChannelKind) -> Option<&Arc<dyn Notifier>> {
        match kind {
            ChannelKind::PushRelay => self.push_relay.as_ref(),
            ChannelKind::Email => self.email.as_ref(),
            ChannelKind::ChatBot => self.chat_bot.as_ref(),
        }
    }

    fn slot_mut(&mut self, kind: ChannelKind) -> &mut Option<Arc<dyn Notifier>> {
        match kind {
            ChannelKind::PushRelay => &mut self.push_relay,
            ChannelKind::Email => &mut self.email,
            ChannelKind::ChatBot => &mut self.chat_bot,
        }
    }

    pub fn is_configured(&self, kind: ChannelKind) -> bool {
        self.slot(kind).is_some()
    }

    /// Send `message` over one channel with that channel's retry policy.
    ///
    /// An unconfigured channel is not an error. A channel that isolates its
    /// targets returns `Ok` even when targets fail; the report says which.
    /// Any other channel returns the last error once retries run out.
    pub async fn send(&self, kind: ChannelKind, message: &OutgoingMessage) -> Result<ChannelReport> {
        let Some(notifier) = self.slot(kind) else {
            tracing::info!("ℹ️ {kind} not configured, skipping");
            return Ok(ChannelReport::not_configured(kind));
        };

        tracing::info!("📤 Sending via {kind}...");
        let policy = notifier.retry_policy();
        let mut results = Vec::new();

        for target in notifier.targets() {
            let shown = notifier.describe_target(&target);
            let label = format!("{kind} [{shown}]");
            match policy.run(&label, |_| notifier.attempt(&target, message)).await {
                Ok(()) => {
                    tracing::info!("✅ {kind} delivered to {shown}");
                    results.push(TargetResult {
                        target: shown,
                        outcome: ChannelOutcome::Delivered,
                    });
                }
                Err(e) if notifier.isolates_targets() => {
                    tracing::error!("❌ {kind} failed for {shown}: {e}");
                    results.push(TargetResult {
                        target: shown,
                        outcome: ChannelOutcome::Failed(e.to_string()),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        Ok(ChannelReport::from_targets(kind, results))
    }

    /// `send`, with a final failure folded into the report.
    async fn send_reported(&self, kind: ChannelKind, message: &OutgoingMessage) -> ChannelReport {
        match self.send(kind, message).await {
            Ok(report) => report,
            Err(e) => {
                tracing::error!("❌ {kind} notification failed: {e}");
                ChannelReport::failed(kind, e.to_string())
            }
        }
    }

    /// Notify the administrator about `reading`.
    ///
    /// When the reading is low, ServerChan then Email are sent in one task.
    /// Telegram is always sent, in a second task, so a stalled alert channel
    /// never delays it.
    pub async fn notify_admin(&self, reading: &Reading) -> DispatchReport {
        tracing::info!("📣 Preparing notifications...");
        let low = reading.is_low();

        let gated = {
            let this = self.clone();
            let message = notify::alert_message(reading);
            tokio::spawn(async move {
                if !low {
                    tracing::info!("🔋 Balance sufficient, skipping serverchan and email");
                    return vec![
                        ChannelReport::skipped(ChannelKind::PushRelay),
                        ChannelReport::skipped(ChannelKind::Email),
                    ];
                }
                vec![
                    this.send_reported(ChannelKind::PushRelay, &message).await,
                    this.send_reported(ChannelKind::Email, &message).await,
                ]
            })
        };

        let chat = {
            let this = self.clone();
            let message = notify::chat_message(reading);
            tokio::spawn(async move { this.send_reported(ChannelKind::ChatBot, &message).await })
        };

        let (gated, chat) = tokio::join!(gated, chat);

        let mut channels = match gated {
            Ok(reports) => reports,
            Err(e) => {
                tracing::error!("❌ Alert task aborted: {e}");
                vec![
                    ChannelReport::failed(ChannelKind::PushRelay, e.to_string()),
                    ChannelReport::failed(ChannelKind::Email, e.to_string()),
                ]
            }
        };
        channels.push(chat.unwrap_or_else(|e| {
            tracing::error!("❌ Telegram task aborted: {e}");
            ChannelReport::failed(ChannelKind::ChatBot, e.to_string())
        }));

        let report = DispatchReport { channels };
        tracing::info!("📬 Dispatch finished: {report}");
        report
    }
}
