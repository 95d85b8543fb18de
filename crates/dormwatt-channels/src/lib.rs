//! # Dormwatt Channels
//! Notification channel strategies.
//!
//! Each channel implements [`dormwatt_core::traits::Notifier`]: it makes one
//! attempt against one target and classifies the result. Retrying, logging
//! per target and isolation between channels belong to the dispatcher.

pub mod email;
pub mod serverchan;
pub mod telegram;

#[cfg(test)]
pub(crate) mod testing;

pub use email::EmailNotifier;
pub use serverchan::ServerChanNotifier;
pub use telegram::TelegramNotifier;

use std::time::Duration;

/// Request timeout for HTTP channels.
pub(crate) const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Safely truncate a response body for log and error messages (UTF-8 safe).
pub(crate) fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_chars).collect();
        format!("{head}... [truncated]")
    }
}
