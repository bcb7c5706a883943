//! Append-only event store.
//!
//! Each category lives in its own JSONL (JSON Lines) file under the store
//! directory. Appends take an exclusive file lock, reads take a shared lock,
//! and lines that fail to parse are skipped with a warning.

use crate::{Error, Result, SleepSession, TimestampedValue};
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Categories of numeric events
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueCategory {
    /// Fluid intake in litres
    Fluid,
    /// Burned energy in kcal
    Calories,
    /// Eaten energy in kcal
    Nutrition,
}

impl ValueCategory {
    fn file_name(self) -> &'static str {
        match self {
            ValueCategory::Fluid => "fluid.jsonl",
            ValueCategory::Calories => "calories.jsonl",
            ValueCategory::Nutrition => "nutrition.jsonl",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            ValueCategory::Fluid => "L",
            ValueCategory::Calories | ValueCategory::Nutrition => "kcal",
        }
    }
}

impl std::str::FromStr for ValueCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "fluid" | "water" => Ok(ValueCategory::Fluid),
            "calories" | "burn" => Ok(ValueCategory::Calories),
            "nutrition" | "food" => Ok(ValueCategory::Nutrition),
            other => Err(Error::InvalidInput(format!("Unknown category: {}", other))),
        }
    }
}

const SLEEP_FILE: &str = "sleep.jsonl";

/// JSONL-backed store of health events
pub struct EventStore {
    dir: PathBuf,
}

impl EventStore {
    /// Open (without creating) a store rooted at `dir`
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Append one numeric entry to its category
    pub fn append_value(&self, category: ValueCategory, entry: &TimestampedValue) -> Result<()> {
        if !entry.value.is_finite() || entry.value < 0.0 {
            return Err(Error::InvalidInput(format!(
                "{:?} value must be a non-negative number, got {}",
                category, entry.value
            )));
        }
        append_line(&self.dir.join(category.file_name()), entry)?;
        tracing::info!("Appended {:?} entry {}", category, entry.id);
        Ok(())
    }

    /// Read every entry of a category, in append order
    pub fn read_values(&self, category: ValueCategory) -> Result<Vec<TimestampedValue>> {
        read_lines(&self.dir.join(category.file_name()))
    }

    /// Append a completed sleep session
    pub fn append_sleep(&self, session: &SleepSession) -> Result<()> {
        append_line(&self.dir.join(SLEEP_FILE), session)?;
        tracing::info!("Appended sleep session {}", session.id);
        Ok(())
    }

    /// Read every completed sleep session, in append order
    pub fn read_sleep(&self) -> Result<Vec<SleepSession>> {
        read_lines(&self.dir.join(SLEEP_FILE))
    }
}

fn append_line<T: Serialize>(path: &Path, record: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = OpenOptions::new().create(true).append(true).open(path)?;
    file.lock_exclusive()?;

    let mut writer = std::io::BufWriter::new(&file);
    let line = serde_json::to_string(record)?;
    writer.write_all(line.as_bytes())?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    drop(writer);

    file.unlock()?;
    Ok(())
}

fn read_lines<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)?;
    file.lock_shared()?;

    let reader = BufReader::new(&file);
    let mut records = Vec::new();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<T>(&line) {
            Ok(record) => records.push(record),
            Err(e) => {
                tracing::warn!(
                    "Skipping corrupt line {} in {:?}: {}",
                    line_num + 1,
                    path,
                    e
                );
            }
        }
    }

    file.unlock()?;
    tracing::debug!("Read {} records from {:?}", records.len(), path);
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[test]
    fn test_append_and_read_values() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = EventStore::open(temp_dir.path().join("events"));

        let entry = TimestampedValue::new(0.25, Utc::now());
        store.append_value(ValueCategory::Fluid, &entry).unwrap();
        store
            .append_value(ValueCategory::Fluid, &TimestampedValue::new(0.5, Utc::now()))
            .unwrap();

        let values = store.read_values(ValueCategory::Fluid).unwrap();
        assert_eq!(values.len(), 2);
        assert_eq!(values[0], entry);
        assert!(store.read_values(ValueCategory::Calories).unwrap().is_empty());
    }

    #[test]
    fn test_rejects_invalid_values() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = EventStore::open(temp_dir.path());

        let err = store
            .append_value(ValueCategory::Calories, &TimestampedValue::new(-10.0, Utc::now()))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(store.read_values(ValueCategory::Calories).unwrap().is_empty());
    }

    #[test]
    fn test_sleep_sessions_roundtrip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = EventStore::open(temp_dir.path());

        let end = Utc::now();
        let session = SleepSession::from_bounds(end - Duration::hours(7), end).unwrap();
        store.append_sleep(&session).unwrap();

        let sessions = store.read_sleep().unwrap();
        assert_eq!(sessions, vec![session]);
    }

    #[test]
    fn test_corrupt_lines_are_skipped() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = EventStore::open(temp_dir.path());
        store
            .append_value(ValueCategory::Nutrition, &TimestampedValue::new(640.0, Utc::now()))
            .unwrap();

        let path = temp_dir.path().join("nutrition.jsonl");
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "{{ invalid json }}").unwrap();
        writeln!(file).unwrap();

        let values = store.read_values(ValueCategory::Nutrition).unwrap();
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].value, 640.0);
    }

    #[test]
    fn test_category_parsing() {
        assert_eq!("fluid".parse::<ValueCategory>().unwrap(), ValueCategory::Fluid);
        assert_eq!("Food".parse::<ValueCategory>().unwrap(), ValueCategory::Nutrition);
        assert!("steps".parse::<ValueCategory>().is_err());
    }
}
