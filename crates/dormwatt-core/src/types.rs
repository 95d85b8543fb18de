//! Shared value types.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::balance::{self, Severity};

/// The two metered quantities polled from the account.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Balances {
    /// Lighting balance (kWh).
    pub lt: f64,
    /// Air-conditioning balance (kWh).
    pub ac: f64,
}

impl Balances {
    pub fn new(lt: f64, ac: f64) -> Self {
        Self { lt, ac }
    }

    pub fn lt_severity(&self) -> Severity {
        balance::classify(self.lt)
    }

    pub fn ac_severity(&self) -> Severity {
        balance::classify(self.ac)
    }

    /// Either quantity being low is enough.
    pub fn is_low(&self) -> bool {
        self.lt_severity() == Severity::Low || self.ac_severity() == Severity::Low
    }
}

/// One polled reading: balances plus the local wall-clock time of the poll.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub balances: Balances,
    pub taken_at: DateTime<FixedOffset>,
}

impl Reading {
    pub fn new(balances: Balances, taken_at: DateTime<FixedOffset>) -> Self {
        Self { balances, taken_at }
    }

    pub fn is_low(&self) -> bool {
        self.balances.is_low()
    }

    /// Notification title matching the reading's severity.
    pub fn title(&self) -> &'static str {
        if self.is_low() {
            "⚠️ Dorm energy alert ⚠️"
        } else {
            "🏠 Dorm energy report 🏠"
        }
    }
}

/// The notification channels Dormwatt knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelKind {
    /// ServerChan push relay, one send per configured key.
    PushRelay,
    /// SMTP email to the configured address.
    Email,
    /// Telegram bot message. Always sent, whatever the severity.
    ChatBot,
}

impl ChannelKind {
    pub const ALL: [ChannelKind; 3] = [Self::PushRelay, Self::Email, Self::ChatBot];
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelKind::PushRelay => write!(f, "serverchan"),
            ChannelKind::Email => write!(f, "email"),
            ChannelKind::ChatBot => write!(f, "telegram"),
        }
    }
}
