//! # Dormwatt Store
//! File-based time series: one JSON file per calendar month.
//!
//! ```text
//! <root>/
//!   2025-01.json          ← every record taken in January, append order
//!   2025-02.json
//!   time.json             ← ["2025-02", "2025-01"], newest first
//!   last_30_records.json  ← the newest N records across the month boundary
//! ```

pub mod period;
pub mod store;

pub use period::PeriodLabel;
pub use store::{Record, TimeSeriesStore};
