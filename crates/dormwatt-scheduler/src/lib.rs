//! # Dormwatt Scheduler
//!
//! Fans a reading out to the notification channels and drives repeated runs.
//!
//! ## Architecture
//! ```text
//! notify_admin(reading)
//!   ├── task A (only when low): ServerChan (every key) → Email
//!   └── task B (always):        Telegram
//!          ↓ join
//!   DispatchReport
//!
//! PeriodicRunner (tokio interval) → job() every `interval_secs`
//! ```

pub mod dispatch;
pub mod engine;
pub mod notify;

pub use dispatch::NotificationDispatcher;
pub use engine::PeriodicRunner;
pub use notify::{ChannelOutcome, ChannelReport, DispatchReport, TargetResult};
