//! Monthly JSON store.
//!
//! Files are human-readable (4-space indent, non-ASCII kept) and tolerant on
//! read: a missing or undecodable file is logged and treated as empty. The
//! storage root itself is never created here; its absence is fatal.

use dormwatt_core::config::StorageConfig;
use dormwatt_core::error::{DormwattError, Result};
use dormwatt_core::types::Reading;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::period::PeriodLabel;

/// One persisted reading, in the shape the dashboard page reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Local time, `MM-DD HH:MM:SS`.
    pub time: String,
    #[serde(rename = "lt_Balance")]
    pub lt_balance: f64,
    #[serde(rename = "ac_Balance")]
    pub ac_balance: f64,
}

impl Record {
    pub fn from_reading(reading: &Reading) -> Self {
        Self {
            time: reading.taken_at.format("%m-%d %H:%M:%S").to_string(),
            lt_balance: reading.balances.lt,
            ac_balance: reading.balances.ac,
        }
    }

    /// Both balances equal; the timestamp is ignored.
    pub fn same_balances(&self, other: &Record) -> bool {
        self.lt_balance == other.lt_balance && self.ac_balance == other.ac_balance
    }
}

/// File-based time-series store.
pub struct TimeSeriesStore {
    root: PathBuf,
    recent_window: usize,
    index_file: String,
    recent_file: String,
}

impl TimeSeriesStore {
    pub fn new(root: &Path) -> Self {
        Self::from_config(&StorageConfig {
            root: root.to_string_lossy().into_owned(),
            ..Default::default()
        })
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self {
            root: config.root_path(),
            recent_window: config.recent_window,
            index_file: config.index_file.clone(),
            recent_file: config.recent_file.clone(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn recent_window(&self) -> usize {
        self.recent_window
    }

    fn period_path(&self, period: PeriodLabel) -> PathBuf {
        self.root.join(period.file_name())
    }

    fn ensure_root(&self) -> Result<()> {
        if self.root.is_dir() {
            Ok(())
        } else {
            Err(DormwattError::StorageRootMissing(self.root.clone()))
        }
    }

    /// Create the storage root and an empty index. Used by `dormwatt init`.
    pub fn init(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root)?;
        let index = self.root.join(&self.index_file);
        if !index.exists() {
            dump_json(&Vec::<String>::new(), &index)?;
        }
        tracing::info!("📁 Storage initialized at {}", self.root.display());
        Ok(())
    }

    /// Records stored for `period`, empty if absent or unreadable.
    pub fn load_period(&self, period: PeriodLabel) -> Vec<Record> {
        load_json(&self.period_path(period)).unwrap_or_default()
    }

    /// Append `reading` to its month's file and return that month's records.
    ///
    /// An append is skipped when both balances equal the last stored record.
    pub fn record(&self, reading: &Reading) -> Result<Vec<Record>> {
        self.ensure_root()?;
        let period = PeriodLabel::of(&reading.taken_at);
        let path = self.period_path(period);
        let mut records: Vec<Record> = load_json(&path).unwrap_or_default();
        let record = Record::from_reading(reading);

        if records.last().is_some_and(|last| last.same_balances(&record)) {
            tracing::info!("⏭️ Reading unchanged since last record, skipping append to {period}");
            return Ok(records);
        }

        records.push(record);
        dump_json(&records, &path)?;
        tracing::info!("💾 Recorded reading #{} in {}", records.len(), path.display());
        Ok(records)
    }

    /// Rebuild the period index from the files on disk, newest first.
    pub fn refresh_index(&self) -> Result<Vec<PeriodLabel>> {
        self.ensure_root()?;

        let index_path = self.root.join(&self.index_file);
        if !index_path.exists() {
            tracing::warn!("⚠️ {} missing, creating an empty one", index_path.display());
            dump_json(&Vec::<String>::new(), &index_path)?;
        }

        let mut periods: Vec<PeriodLabel> = std::fs::read_dir(&self.root)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .filter_map(|entry| PeriodLabel::from_file_name(&entry.file_name().to_string_lossy()))
            .collect();
        periods.sort_unstable_by(|a, b| b.cmp(a));

        let labels: Vec<String> = periods.iter().map(|p| p.to_string()).collect();
        dump_json(&labels, &index_path)?;
        tracing::info!("🗂️ Period index refreshed: {} period(s)", periods.len());
        Ok(periods)
    }

    /// Recompute and persist the recent-records view.
    ///
    /// `current` is `period`'s records. When it holds fewer than the window
    /// size, the newest older period on disk supplies the missing head.
    pub fn refresh_recent_window(
        &self,
        period: PeriodLabel,
        current: &[Record],
    ) -> Result<Vec<Record>> {
        let index = self.refresh_index()?;
        let n = self.recent_window;

        let mut window: Vec<Record> = Vec::with_capacity(n.max(current.len()));
        if current.len() < n {
            if let Some(previous) = index.iter().find(|p| **p < period) {
                let older = self.load_period(*previous);
                let take = (n - current.len()).min(older.len());
                window.extend_from_slice(&older[older.len() - take..]);
                tracing::debug!("Backfilled {take} record(s) from {previous}");
            }
        }
        window.extend_from_slice(current);
        if window.len() > n {
            window = window.split_off(window.len() - n);
        }

        self.save_recent_window(&window)?;
        Ok(window)
    }

    fn save_recent_window(&self, window: &[Record]) -> Result<()> {
        dump_json(window, &self.root.join(&self.recent_file))?;
        tracing::info!("📊 Recent window refreshed: {} record(s)", window.len());
        Ok(())
    }

    /// Rebuild index and recent window from what is already stored.
    ///
    /// With no period files the window is simply emptied, so no clock or
    /// UTC offset is involved.
    pub fn reindex(&self) -> Result<Vec<Record>> {
        let index = self.refresh_index()?;
        let Some(newest) = index.first().copied() else {
            self.save_recent_window(&[])?;
            return Ok(Vec::new());
        };
        let current = self.load_period(newest);
        self.refresh_recent_window(newest, &current)
    }
}

/// Read JSON from `path`. Missing or malformed files yield `None`.
fn load_json<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!("⚠️ File not found: {}", path.display());
            return None;
        }
        Err(e) => {
            tracing::error!("❌ Failed to read {}: {e}", path.display());
            return None;
        }
    };
    match serde_json::from_str(&content) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::error!("❌ {} is not valid JSON: {e}", path.display());
            None
        }
    }
}

/// Write `value` to `path` as 4-space indented JSON.
fn dump_json<T: Serialize + ?Sized>(value: &T, path: &Path) -> Result<()> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    std::fs::write(path, &buf)?;
    tracing::debug!("💾 Saved {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};
    use dormwatt_core::types::Balances;

    fn cst() -> FixedOffset {
        FixedOffset::east_opt(8 * 3600).unwrap()
    }

    fn reading(lt: f64, ac: f64, month: u32, day: u32) -> Reading {
        let ts = cst().with_ymd_and_hms(2025, month, day, 9, 30, 0).unwrap();
        Reading::new(Balances::new(lt, ac), ts)
    }

    fn record(i: usize) -> Record {
        Record {
            time: format!("01-01 00:00:{i:02}"),
            lt_balance: i as f64,
            ac_balance: 50.0,
        }
    }

    fn write_period(store: &TimeSeriesStore, label: &str, records: &[Record]) {
        dump_json(records, &store.period_path(label.parse().unwrap())).unwrap();
    }

    #[test]
    fn test_record_shape() {
        let r = Record::from_reading(&reading(12.5, 230.0, 3, 7));
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"time": "03-07 09:30:00", "lt_Balance": 12.5, "ac_Balance": 230.0})
        );
    }

    #[test]
    fn test_record_appends_and_skips_duplicate() {
        let dir = tempfile::tempdir().unwrap();
        let store = TimeSeriesStore::new(dir.path());

        assert_eq!(store.record(&reading(12.5, 80.0, 3, 1)).unwrap().len(), 1);
        assert_eq!(store.record(&reading(12.5, 80.0, 3, 2)).unwrap().len(), 1);
        assert_eq!(store.record(&reading(12.0, 80.0, 3, 3)).unwrap().len(), 2);

        let stored = store.load_period("2025-03".parse().unwrap());
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].time, "03-01 09:30:00");
        assert_eq!(stored[1].lt_balance, 12.0);
    }

    #[test]
    fn test_files_are_indented() {
        let dir = tempfile::tempdir().unwrap();
        let store = TimeSeriesStore::new(dir.path());
        store.record(&reading(1.0, 2.0, 3, 1)).unwrap();
        let text = std::fs::read_to_string(dir.path().join("2025-03.json")).unwrap();
        assert!(text.contains("\n    {\n        \"time\""));
    }

    #[test]
    fn test_corrupt_file_is_treated_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = TimeSeriesStore::new(dir.path());
        std::fs::write(dir.path().join("2025-03.json"), "{not json").unwrap();

        let records = store.record(&reading(5.0, 5.0, 3, 1)).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_missing_root_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let store = TimeSeriesStore::new(&dir.path().join("absent"));

        assert!(matches!(
            store.refresh_index(),
            Err(DormwattError::StorageRootMissing(_))
        ));
        assert!(matches!(
            store.record(&reading(1.0, 1.0, 3, 1)),
            Err(DormwattError::StorageRootMissing(_))
        ));
        assert!(!dir.path().join("absent").exists());
    }

    #[test]
    fn test_index_is_calendar_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let store = TimeSeriesStore::new(dir.path());
        for label in ["2024-11", "2025-01", "2025-02"] {
            write_period(&store, label, &[]);
        }
        std::fs::write(dir.path().join("notes.json"), "[]").unwrap();

        let index = store.refresh_index().unwrap();
        let labels: Vec<String> = index.iter().map(|p| p.to_string()).collect();
        assert_eq!(labels, vec!["2025-02", "2025-01", "2024-11"]);

        let persisted: Vec<String> =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join("time.json")).unwrap())
                .unwrap();
        assert_eq!(persisted, labels);
    }

    #[test]
    fn test_index_created_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = TimeSeriesStore::new(dir.path());
        assert!(store.refresh_index().unwrap().is_empty());
        assert!(dir.path().join("time.json").exists());
    }

    #[test]
    fn test_recent_window_backfills_from_previous_period() {
        let dir = tempfile::tempdir().unwrap();
        let store = TimeSeriesStore::new(dir.path());
        let previous: Vec<Record> = (0..40).map(record).collect();
        let current: Vec<Record> = (100..105).map(record).collect();
        write_period(&store, "2025-01", &previous);
        write_period(&store, "2025-02", &current);

        let window = store
            .refresh_recent_window("2025-02".parse().unwrap(), &current)
            .unwrap();
        assert_eq!(window.len(), 30);
        assert_eq!(&window[..25], &previous[15..]);
        assert_eq!(&window[25..], &current[..]);

        let persisted: Vec<Record> = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join("last_30_records.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(persisted, window);
    }

    #[test]
    fn test_recent_window_keeps_newest_when_full() {
        let dir = tempfile::tempdir().unwrap();
        let store = TimeSeriesStore::new(dir.path());
        let current: Vec<Record> = (0..45).map(record).collect();
        write_period(&store, "2025-02", &current);
        write_period(&store, "2025-01", &[record(99)]);

        let window = store
            .refresh_recent_window("2025-02".parse().unwrap(), &current)
            .unwrap();
        assert_eq!(window.len(), 30);
        assert_eq!(window.first(), Some(&current[15]));
        assert_eq!(window.last(), Some(&current[44]));
    }

    #[test]
    fn test_recent_window_short_history() {
        let dir = tempfile::tempdir().unwrap();
        let store = TimeSeriesStore::new(dir.path());
        let current: Vec<Record> = (0..3).map(record).collect();
        write_period(&store, "2025-02", &current);

        let window = store
            .refresh_recent_window("2025-02".parse().unwrap(), &current)
            .unwrap();
        assert_eq!(window, current);
    }

    #[test]
    fn test_init_and_reindex() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("page").join("data");
        let store = TimeSeriesStore::new(&root);
        store.init().unwrap();
        assert!(root.join("time.json").exists());

        write_period(&store, "2025-01", &(0..28).map(record).collect::<Vec<_>>());
        write_period(&store, "2025-02", &(100..104).map(record).collect::<Vec<_>>());
        let window = store.reindex().unwrap();
        assert_eq!(window.len(), 30);
        assert_eq!(window.last().unwrap().lt_balance, 103.0);
    }

    #[test]
    fn test_reindex_empty_store_clears_window() {
        let dir = tempfile::tempdir().unwrap();
        let store = TimeSeriesStore::new(dir.path());
        store.init().unwrap();
        let recent = dir.path().join("last_30_records.json");
        std::fs::write(&recent, r#"[{"time":"01-01 00:00:00","lt_Balance":1.0,"ac_Balance":2.0}]"#)
            .unwrap();

        let window = store.reindex().unwrap();
        assert!(window.is_empty());
        let on_disk: Vec<Record> =
            serde_json::from_str(&std::fs::read_to_string(&recent).unwrap()).unwrap();
        assert!(on_disk.is_empty());
    }
}
