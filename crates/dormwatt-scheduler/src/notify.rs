//! Notification content and per-run delivery reports.

use dormwatt_core::balance::{self, EscapeMode, LOW_CLOSING};
use dormwatt_core::traits::OutgoingMessage;
use dormwatt_core::types::{ChannelKind, Reading};
use serde::Serialize;
use std::fmt;

/// Message for the escalation channels (ServerChan, Email). Plain text.
pub fn alert_message(reading: &Reading) -> OutgoingMessage {
    let mut content = balance::format_report(&reading.balances, EscapeMode::Plain);
    content.push_str(LOW_CLOSING);
    OutgoingMessage::new(reading.title(), content)
}

/// Message for the always-on chat bot. Title and content are both escaped
/// for MarkdownV2.
pub fn chat_message(reading: &Reading) -> OutgoingMessage {
    let mut content = balance::format_report(&reading.balances, EscapeMode::MarkdownV2);
    content.push_str(&balance::escape_markdown_v2(balance::closing_line(
        &reading.balances,
    )));
    OutgoingMessage::new(balance::escape_markdown_v2(reading.title()), content)
}

/// What happened to one channel (or one of its targets) in a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ChannelOutcome {
    Delivered,
    /// Not attempted because the reading was not low.
    Skipped,
    NotConfigured,
    Failed(String),
}

impl ChannelOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

impl fmt::Display for ChannelOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Delivered => write!(f, "delivered"),
            Self::Skipped => write!(f, "skipped"),
            Self::NotConfigured => write!(f, "not configured"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// Outcome for one target of a multi-target channel. `target` is masked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetResult {
    pub target: String,
    pub outcome: ChannelOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelReport {
    pub kind: ChannelKind,
    pub outcome: ChannelOutcome,
    /// Per-target detail; empty unless the channel was attempted.
    pub targets: Vec<TargetResult>,
}

impl ChannelReport {
    pub fn new(kind: ChannelKind, outcome: ChannelOutcome) -> Self {
        Self {
            kind,
            outcome,
            targets: Vec::new(),
        }
    }

    pub fn skipped(kind: ChannelKind) -> Self {
        Self::new(kind, ChannelOutcome::Skipped)
    }

    pub fn not_configured(kind: ChannelKind) -> Self {
        Self::new(kind, ChannelOutcome::NotConfigured)
    }

    pub fn failed(kind: ChannelKind, reason: impl Into<String>) -> Self {
        Self::new(kind, ChannelOutcome::Failed(reason.into()))
    }

    /// Overall outcome from per-target results: delivered only if every
    /// target was.
    pub fn from_targets(kind: ChannelKind, targets: Vec<TargetResult>) -> Self {
        let failed = targets.iter().filter(|t| t.outcome.is_failure()).count();
        let outcome = if failed == 0 {
            ChannelOutcome::Delivered
        } else {
            ChannelOutcome::Failed(format!("{failed}/{} targets failed", targets.len()))
        };
        Self {
            kind,
            outcome,
            targets,
        }
    }
}

/// Everything `notify_admin` did, one entry per channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub channels: Vec<ChannelReport>,
}

impl DispatchReport {
    pub fn get(&self, kind: ChannelKind) -> Option<&ChannelReport> {
        self.channels.iter().find(|c| c.kind == kind)
    }

    pub fn outcome(&self, kind: ChannelKind) -> Option<&ChannelOutcome> {
        self.get(kind).map(|c| &c.outcome)
    }

    pub fn delivered(&self) -> usize {
        self.channels
            .iter()
            .filter(|c| c.outcome == ChannelOutcome::Delivered)
            .count()
    }

    pub fn failed(&self) -> usize {
        self.channels.iter().filter(|c| c.outcome.is_failure()).count()
    }
}

impl fmt::Display for DispatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .channels
            .iter()
            .map(|c| format!("{}={}", c.kind, c.outcome))
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}
