//! # Dormwatt Core
//!
//! Shared building blocks for the energy balance monitor.
//!
//! ```text
//! ReadingSource ──► Balances ──► balance::classify / format_report
//!                                   │
//!                   Notifier strategies ◄── RetryPolicy::run
//! ```

pub mod balance;
pub mod config;
pub mod error;
pub mod retry;
pub mod traits;
pub mod types;

pub use balance::{EscapeMode, Severity, escape_markdown_v2};
pub use config::DormwattConfig;
pub use error::{DormwattError, Result};
pub use retry::{Backoff, Outcome, RetryPolicy};
pub use types::{Balances, ChannelKind, Reading};
