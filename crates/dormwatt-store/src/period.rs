//! Calendar-month period labels (`YYYY-MM`).

use chrono::{DateTime, Datelike, NaiveDate, TimeZone};
use dormwatt_core::error::DormwattError;
use std::fmt;
use std::str::FromStr;

const FILE_EXT: &str = ".json";

/// One calendar month. Orders by calendar date, not by string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeriodLabel {
    year: i32,
    month: u32,
}

impl PeriodLabel {
    /// `None` for an impossible month.
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1)?;
        Some(Self { year, month })
    }

    /// Period containing `ts`, in `ts`'s own offset.
    pub fn of<Tz: TimeZone>(ts: &DateTime<Tz>) -> Self {
        Self {
            year: ts.year(),
            month: ts.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// The calendar month before this one.
    pub fn previous(&self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    /// `2025-01` → `2025-01.json`.
    pub fn file_name(&self) -> String {
        format!("{self}{FILE_EXT}")
    }

    /// Inverse of [`file_name`](Self::file_name). Anything else is `None`.
    pub fn from_file_name(name: &str) -> Option<Self> {
        name.strip_suffix(FILE_EXT)?.parse().ok()
    }
}

impl fmt::Display for PeriodLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for PeriodLabel {
    type Err = DormwattError;

    /// Exactly four digits, a dash, two digits.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DormwattError::Storage(format!("Invalid period label: {s:?}"));
        let bytes = s.as_bytes();
        let shape_ok = bytes.len() == 7
            && bytes[4] == b'-'
            && bytes
                .iter()
                .enumerate()
                .all(|(i, b)| i == 4 || b.is_ascii_digit());
        if !shape_ok {
            return Err(invalid());
        }
        let year: i32 = s[..4].parse().map_err(|_| invalid())?;
        let month: u32 = s[5..].parse().map_err(|_| invalid())?;
        Self::new(year, month).ok_or_else(invalid)
    }
}
