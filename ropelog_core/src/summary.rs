//! Daily summary aggregation.
//!
//! Session finalization emits one aggregate record per calendar day of
//! `ended_at`. Summaries are kept as a date-keyed JSON document with the
//! same locked atomic-write discipline as the session store, and can be
//! exported to CSV for external tooling.

use crate::{DailySummary, Error, Result};
use chrono::NaiveDate;
use fs2::FileExt;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Store for per-day training summaries
#[derive(Clone, Debug)]
pub struct SummaryStore {
    path: PathBuf,
}

/// CSV row shape for exported summaries
#[derive(Debug, serde::Serialize)]
struct CsvRow {
    date: String,
    total_jumps: u32,
    session_count: u32,
    active_seconds: i64,
}

impl From<&DailySummary> for CsvRow {
    fn from(summary: &DailySummary) -> Self {
        CsvRow {
            date: summary.date.to_string(),
            total_jumps: summary.total_jumps,
            session_count: summary.session_count,
            active_seconds: summary.active_seconds,
        }
    }
}

impl SummaryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load all summaries, keyed by date. Missing file is an empty map.
    pub fn load(&self) -> Result<BTreeMap<NaiveDate, DailySummary>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }

        let file = File::open(&self.path)?;
        file.lock_shared()?;

        let mut contents = String::new();
        let mut reader = std::io::BufReader::new(&file);
        let read_result = reader.read_to_string(&mut contents);
        file.unlock()?;
        read_result?;

        let summaries = serde_json::from_str(&contents)
            .map_err(|e| Error::State(format!("corrupt summary file {:?}: {}", self.path, e)))?;
        Ok(summaries)
    }

    fn save(&self, summaries: &BTreeMap<NaiveDate, DailySummary>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let temp = NamedTempFile::new_in(self.path.parent().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::Other, "summary path missing parent")
        })?)?;

        temp.as_file().lock_exclusive()?;

        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            let contents = serde_json::to_string(summaries)?;
            writer.write_all(contents.as_bytes())?;
            writer.flush()?;
        }

        temp.as_file().sync_all()?;
        temp.as_file().unlock()?;

        temp.persist(&self.path).map_err(|e| Error::Io(e.error))?;
        Ok(())
    }

    /// Fold one finished session into the day's aggregate record.
    pub fn upsert(&self, date: NaiveDate, jumps: u32, active_seconds: i64) -> Result<DailySummary> {
        let mut summaries = self.load()?;
        let entry = summaries.entry(date).or_insert(DailySummary {
            date,
            total_jumps: 0,
            session_count: 0,
            active_seconds: 0,
        });
        entry.total_jumps += jumps;
        entry.session_count += 1;
        entry.active_seconds += active_seconds;
        let updated = entry.clone();

        self.save(&summaries)?;
        tracing::debug!(
            "Daily summary for {}: {} jumps over {} sessions",
            date,
            updated.total_jumps,
            updated.session_count
        );
        Ok(updated)
    }

    /// Export all summaries to a CSV file, oldest day first.
    pub fn export_csv(&self, csv_path: &Path) -> Result<usize> {
        let summaries = self.load()?;
        if summaries.is_empty() {
            tracing::info!("No summaries to export");
            return Ok(0);
        }

        if let Some(parent) = csv_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut writer = csv::Writer::from_path(csv_path)?;
        for summary in summaries.values() {
            writer.serialize(CsvRow::from(summary))?;
        }
        writer.flush()?;
        let file = writer
            .into_inner()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        file.sync_all()?;

        tracing::info!("Exported {} daily summaries to {:?}", summaries.len(), csv_path);
        Ok(summaries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> SummaryStore {
        SummaryStore::new(dir.path().join("summaries.json"))
    }

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn test_upsert_creates_day_record() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = store_in(&temp_dir);

        let summary = store.upsert(date("2026-08-29"), 4000, 1200).unwrap();
        assert_eq!(summary.total_jumps, 4000);
        assert_eq!(summary.session_count, 1);
        assert_eq!(summary.active_seconds, 1200);
    }

    #[test]
    fn test_upsert_accumulates_same_day() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = store_in(&temp_dir);

        store.upsert(date("2026-08-29"), 1500, 600).unwrap();
        let summary = store.upsert(date("2026-08-29"), 2500, 900).unwrap();

        assert_eq!(summary.total_jumps, 4000);
        assert_eq!(summary.session_count, 2);
        assert_eq!(summary.active_seconds, 1500);

        // Only one record for the day
        assert_eq!(store.load().unwrap().len(), 1);
    }

    #[test]
    fn test_separate_days_stay_separate() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = store_in(&temp_dir);

        store.upsert(date("2026-08-28"), 1000, 300).unwrap();
        store.upsert(date("2026-08-29"), 2000, 700).unwrap();

        let summaries = store.load().unwrap();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[&date("2026-08-28")].total_jumps, 1000);
        assert_eq!(summaries[&date("2026-08-29")].total_jumps, 2000);
    }

    #[test]
    fn test_export_csv() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = store_in(&temp_dir);
        let csv_path = temp_dir.path().join("summaries.csv");

        store.upsert(date("2026-08-28"), 1000, 300).unwrap();
        store.upsert(date("2026-08-29"), 2000, 700).unwrap();

        let count = store.export_csv(&csv_path).unwrap();
        assert_eq!(count, 2);

        let contents = std::fs::read_to_string(&csv_path).unwrap();
        assert!(contents.starts_with("date,total_jumps,session_count,active_seconds"));
        assert!(contents.contains("2026-08-28,1000,1,300"));
    }

    #[test]
    fn test_export_empty_store() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = store_in(&temp_dir);
        let csv_path = temp_dir.path().join("summaries.csv");

        assert_eq!(store.export_csv(&csv_path).unwrap(), 0);
        assert!(!csv_path.exists());
    }
}
