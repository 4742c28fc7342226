//! Optimization result store keyed by (strategy, relaxed).
//!
//! `JsonFileStore` keeps one `*_latest.json` per key plus a timestamped
//! archive copy of every record it writes. Each file is written to a temp
//! file in the target directory and atomically persisted, so a failed write
//! never leaves a partial record behind.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use levlab_core::domain::Timeframe;
use levlab_core::strategy::{StrategyKind, StrategyParams};

use crate::metrics::Scorecard;
use crate::runner::SCHEMA_VERSION;

/// Records older than this are treated as absent.
pub const DEFAULT_STALE_AFTER_DAYS: i64 = 7;

/// Errors from store I/O.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl From<tempfile::PersistError> for StoreError {
    fn from(e: tempfile::PersistError) -> Self {
        StoreError::Io(e.error)
    }
}

/// Identifies one slot in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StoreKey {
    pub strategy: StrategyKind,
    pub relaxed: bool,
}

impl StoreKey {
    pub fn new(strategy: StrategyKind, relaxed: bool) -> Self {
        Self { strategy, relaxed }
    }

    /// `optimization_{strategy}` or `optimization_{strategy}_relaxed`.
    pub fn file_stem(&self) -> String {
        if self.relaxed {
            format!("optimization_{}_relaxed", self.strategy.id())
        } else {
            format!("optimization_{}", self.strategy.id())
        }
    }
}

/// The persisted outcome of one optimization pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationRecord {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub strategy: StrategyKind,
    pub relaxed: bool,
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub timeframe: Timeframe,
    pub best_params: StrategyParams,
    pub best_result: Scorecard,
    pub candidate_count: usize,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl OptimizationRecord {
    pub fn key(&self) -> StoreKey {
        StoreKey::new(self.strategy, self.relaxed)
    }

    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.timestamp
    }
}

/// Keyed persistence for optimization records.
pub trait OptimizationStore: Send + Sync {
    /// `Ok(None)` when nothing has been stored under `key`.
    fn get(&self, key: &StoreKey) -> Result<Option<OptimizationRecord>, StoreError>;

    fn put(&self, key: &StoreKey, record: &OptimizationRecord) -> Result<(), StoreError>;
}

/// Most recent usable record for `strategy`.
///
/// A fresh relaxed record wins over a fresh normal one. Records older than
/// `stale_after` are skipped. Read failures are logged and treated as absent.
pub fn load_latest(
    store: &dyn OptimizationStore,
    strategy: StrategyKind,
    now: DateTime<Utc>,
    stale_after: Duration,
) -> Option<OptimizationRecord> {
    for relaxed in [true, false] {
        let key = StoreKey::new(strategy, relaxed);
        match store.get(&key) {
            Ok(Some(record)) if record.age(now) <= stale_after => return Some(record),
            Ok(Some(record)) => {
                debug!(
                    key = %key.file_stem(),
                    age_hours = record.age(now).num_hours(),
                    "stored optimization is stale"
                );
            }
            Ok(None) => {}
            Err(e) => warn!(key = %key.file_stem(), error = %e, "failed to read stored optimization"),
        }
    }
    None
}

// ─── JSON file store ────────────────────────────────────────────────

/// One JSON file per key in a directory, with timestamped archive copies.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// The directory is created lazily on first write.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the `*_latest.json` file for `key`.
    pub fn latest_path(&self, key: &StoreKey) -> PathBuf {
        self.dir.join(format!("{}_latest.json", key.file_stem()))
    }

    /// Path of the archive copy for `key` written at `timestamp`.
    pub fn archive_path(&self, key: &StoreKey, timestamp: DateTime<Utc>) -> PathBuf {
        self.dir.join(format!(
            "{}_{}.json",
            key.file_stem(),
            timestamp.format("%Y%m%d_%H%M%S")
        ))
    }

    fn write_atomic(&self, path: &Path, json: &[u8]) -> Result<(), StoreError> {
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(json)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path)?;
        Ok(())
    }
}

impl OptimizationStore for JsonFileStore {
    fn get(&self, key: &StoreKey) -> Result<Option<OptimizationRecord>, StoreError> {
        let path = self.latest_path(key);
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&path)?;
        let record = serde_json::from_str(&json)?;
        Ok(Some(record))
    }

    fn put(&self, key: &StoreKey, record: &OptimizationRecord) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)?;
        let json = serde_json::to_vec_pretty(record)?;
        self.write_atomic(&self.latest_path(key), &json)?;
        self.write_atomic(&self.archive_path(key, record.timestamp), &json)?;
        debug!(path = %self.latest_path(key).display(), "optimization record saved");
        Ok(())
    }
}

// ─── In-memory store ────────────────────────────────────────────────

/// Mutex-guarded map, for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<StoreKey, OptimizationRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl OptimizationStore for MemoryStore {
    fn get(&self, key: &StoreKey) -> Result<Option<OptimizationRecord>, StoreError> {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        Ok(records.get(key).cloned())
    }

    fn put(&self, key: &StoreKey, record: &OptimizationRecord) -> Result<(), StoreError> {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        records.insert(*key, record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(strategy: StrategyKind, relaxed: bool, timestamp: DateTime<Utc>) -> OptimizationRecord {
        OptimizationRecord {
            schema_version: SCHEMA_VERSION,
            strategy,
            relaxed,
            timestamp,
            symbol: "BTCUSDT".into(),
            timeframe: Timeframe::H1,
            best_params: strategy.default_params(),
            best_result: Scorecard {
                total_trades: 4,
                buy_trades: 2,
                sell_trades: 2,
                win_rate: 0.5,
                profit_factor: 1.5,
                total_return: 42.0,
                total_return_pct: 0.42,
                max_drawdown: 0.03,
                total_pnl: 42.0,
                total_commission: 4.8,
                initial_balance: 10_000.0,
                final_balance: 10_042.0,
                period_start: Some(timestamp - Duration::days(30)),
                period_end: Some(timestamp),
            },
            candidate_count: 54,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap()
    }

    #[test]
    fn file_names_follow_key() {
        let store = JsonFileStore::new("/tmp/levlab");
        let key = StoreKey::new(StrategyKind::Rsi, true);
        assert!(store
            .latest_path(&key)
            .ends_with("optimization_rsi_relaxed_latest.json"));
        let archive = store.archive_path(&StoreKey::new(StrategyKind::Ma, false), now());
        assert!(archive.ends_with("optimization_ma_20240510_120000.json"));
    }

    #[test]
    fn memory_store_roundtrip() {
        let store = MemoryStore::new();
        let key = StoreKey::new(StrategyKind::Ma, false);
        assert!(store.get(&key).unwrap().is_none());
        let rec = record(StrategyKind::Ma, false, now());
        store.put(&key, &rec).unwrap();
        assert_eq!(store.get(&key).unwrap(), Some(rec));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn load_latest_prefers_fresh_relaxed() {
        let store = MemoryStore::new();
        let normal = record(StrategyKind::Rsi, false, now() - Duration::hours(1));
        let relaxed = record(StrategyKind::Rsi, true, now() - Duration::days(2));
        store.put(&normal.key(), &normal).unwrap();
        store.put(&relaxed.key(), &relaxed).unwrap();

        let found = load_latest(&store, StrategyKind::Rsi, now(), Duration::days(7)).unwrap();
        assert!(found.relaxed);
    }

    #[test]
    fn stale_relaxed_falls_back_to_normal() {
        let store = MemoryStore::new();
        let normal = record(StrategyKind::Ma, false, now() - Duration::days(1));
        let relaxed = record(StrategyKind::Ma, true, now() - Duration::days(8));
        store.put(&normal.key(), &normal).unwrap();
        store.put(&relaxed.key(), &relaxed).unwrap();

        let found = load_latest(&store, StrategyKind::Ma, now(), Duration::days(7)).unwrap();
        assert!(!found.relaxed);
    }

    #[test]
    fn everything_stale_is_absent() {
        let store = MemoryStore::new();
        let normal = record(StrategyKind::Ma, false, now() - Duration::days(10));
        store.put(&normal.key(), &normal).unwrap();
        assert!(load_latest(&store, StrategyKind::Ma, now(), Duration::days(7)).is_none());
        // Other strategy untouched.
        assert!(load_latest(&store, StrategyKind::Rsi, now(), Duration::days(7)).is_none());
    }
}
