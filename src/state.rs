//! Per-day counters and their JSON snapshot file

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use crate::core::count::day_key;
use crate::error::Result;

/// Counters for a single calendar day
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DailyAggregate {
    pub total: u64,
    pub unique_visitors: HashSet<String>,
}

/// Day key (`YYYY-MM-DD`) -> counters
pub type Days = BTreeMap<String, DailyAggregate>;

#[derive(Debug, Serialize, Deserialize)]
struct DayRecord {
    #[serde(alias = "events")]
    total: u64,
    #[serde(alias = "users", default)]
    uniques: Vec<String>,
}

#[derive(Debug, Serialize)]
struct Snapshot {
    days: BTreeMap<String, DayRecord>,
}

/// Every shape the snapshot file has been written in
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SnapshotFile {
    Bucketed {
        days: BTreeMap<String, DayRecord>,
    },
    Legacy {
        events: u64,
        #[serde(default)]
        users: Vec<String>,
    },
    Flat(BTreeMap<String, DayRecord>),
}

impl From<DayRecord> for DailyAggregate {
    fn from(record: DayRecord) -> Self {
        let unique_visitors: HashSet<String> = record.uniques.into_iter().collect();
        let total = record.total.max(unique_visitors.len() as u64);
        if total != record.total {
            tracing::warn!(
                "Snapshot day has {} uniques but total {}, raising total",
                unique_visitors.len(),
                record.total
            );
        }
        Self {
            total,
            unique_visitors,
        }
    }
}

impl From<&DailyAggregate> for DayRecord {
    fn from(aggregate: &DailyAggregate) -> Self {
        let mut uniques: Vec<String> = aggregate.unique_visitors.iter().cloned().collect();
        uniques.sort();
        Self {
            total: aggregate.total,
            uniques,
        }
    }
}

/// Snapshot file on disk. Writes are serialized by an internal lock.
pub struct Store {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl Store {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the snapshot. Missing or unreadable files yield an empty mapping.
    pub fn load(&self) -> Days {
        match self.try_load() {
            Ok(Some(days)) => {
                tracing::info!("Loaded {} days from {}", days.len(), self.path.display());
                days
            }
            Ok(None) => {
                tracing::warn!(
                    "Snapshot {} not found, starting empty",
                    self.path.display()
                );
                Days::new()
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to read snapshot {}: {}, starting empty",
                    self.path.display(),
                    e
                );
                Days::new()
            }
        }
    }

    fn try_load(&self) -> Result<Option<Days>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let raw = std::fs::read_to_string(&self.path)?;
        let days = match serde_json::from_str::<SnapshotFile>(&raw)? {
            SnapshotFile::Bucketed { days } | SnapshotFile::Flat(days) => days
                .into_iter()
                .map(|(key, record)| (key, DailyAggregate::from(record)))
                .collect(),
            SnapshotFile::Legacy { events, users } => {
                let today = day_key(Utc::now());
                tracing::warn!(
                    "Snapshot {} has no day buckets, importing into {}",
                    self.path.display(),
                    today
                );
                let record = DayRecord {
                    total: events,
                    uniques: users,
                };
                Days::from([(today, DailyAggregate::from(record))])
            }
        };

        Ok(Some(days))
    }

    /// Overwrite the snapshot with `days`.
    pub fn persist(&self, days: &Days) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.write(days)
    }

    /// Take the snapshot while holding the write lock, so the newest state
    /// is always the last one written.
    pub fn persist_with<F>(&self, snapshot: F) -> Result<()>
    where
        F: FnOnce() -> Days,
    {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let days = snapshot();
        self.write(&days)
    }

    fn write(&self, days: &Days) -> Result<()> {
        let snapshot = Snapshot {
            days: days
                .iter()
                .map(|(key, aggregate)| (key.clone(), DayRecord::from(aggregate)))
                .collect(),
        };
        let json = serde_json::to_string_pretty(&snapshot)?;
        std::fs::write(&self.path, json)?;

        tracing::debug!("Saved {} days to {}", days.len(), self.path.display());
        Ok(())
    }
}
