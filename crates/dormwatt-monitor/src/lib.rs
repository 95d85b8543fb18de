//! # Dormwatt Monitor
//!
//! One monitoring pass, end to end:
//!
//! ```text
//! PortalSource ──(RetryPolicy::upstream)──► Reading
//!     │
//!     ├── NotificationDispatcher::notify_admin
//!     └── TimeSeriesStore::record → refresh_recent_window
//! ```

pub mod run;
pub mod source;

pub use run::{MonitorRun, RunAborted, RunSummary};
pub use source::PortalSource;
