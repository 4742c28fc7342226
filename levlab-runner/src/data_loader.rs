//! CSV-backed market data source.
//!
//! Series live at `{dir}/{symbol}_{timeframe}.csv` with the header
//! `timestamp,open,high,low,close,volume`. Timestamps are RFC 3339 strings or
//! epoch milliseconds. Rows are sorted and de-duplicated on load, so files may
//! be appended to out of order.

use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use levlab_core::data::{take_latest, DataError, MarketDataSource};
use levlab_core::domain::{canonicalize, Candle, Timeframe};

/// One CSV row before timestamp parsing.
#[derive(Debug, Deserialize, Serialize)]
struct CandleRow {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

/// Reads candle files from a directory.
#[derive(Debug, Clone)]
pub struct CsvSource {
    dir: PathBuf,
}

impl CsvSource {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, symbol: &str, timeframe: Timeframe) -> PathBuf {
        self.dir.join(format!("{symbol}_{timeframe}.csv"))
    }

    /// Load the whole file, canonicalized.
    pub fn load(&self, symbol: &str, timeframe: Timeframe) -> Result<Vec<Candle>, DataError> {
        let path = self.path_for(symbol, timeframe);
        if !path.exists() {
            return Err(DataError::NotFound {
                symbol: symbol.to_string(),
                timeframe,
            });
        }
        let malformed = |reason: String| DataError::Malformed {
            symbol: symbol.to_string(),
            reason,
        };

        let mut reader = csv::Reader::from_path(&path).map_err(|e| malformed(e.to_string()))?;
        let mut candles = Vec::new();
        for (line, row) in reader.deserialize::<CandleRow>().enumerate() {
            let row = row.map_err(|e| malformed(e.to_string()))?;
            let timestamp = parse_timestamp(&row.timestamp)
                .ok_or_else(|| malformed(format!("row {}: bad timestamp '{}'", line + 1, row.timestamp)))?;
            candles.push(Candle {
                timestamp,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
                volume: row.volume,
            });
        }
        Ok(canonicalize(candles))
    }

    /// Write `candles` to the file for (symbol, timeframe), RFC 3339 timestamps.
    pub fn save(&self, symbol: &str, timeframe: Timeframe, candles: &[Candle]) -> Result<PathBuf, DataError> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(symbol, timeframe);
        let io_err = |e: csv::Error| DataError::Unavailable(e.to_string());
        let mut writer = csv::Writer::from_path(&path).map_err(io_err)?;
        for c in candles {
            writer
                .serialize(CandleRow {
                    timestamp: c.timestamp.to_rfc3339(),
                    open: c.open,
                    high: c.high,
                    low: c.low,
                    close: c.close,
                    volume: c.volume,
                })
                .map_err(io_err)?;
        }
        writer.flush()?;
        Ok(path)
    }
}

impl MarketDataSource for CsvSource {
    fn name(&self) -> &str {
        "csv"
    }

    fn fetch_series(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        count: usize,
    ) -> Result<Vec<Candle>, DataError> {
        Ok(take_latest(self.load(symbol, timeframe)?, count))
    }
}

/// RFC 3339 first, then integer epoch milliseconds.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    let millis: i64 = raw.parse().ok()?;
    Utc.timestamp_millis_opt(millis).single()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, body: &str) {
        let mut f = std::fs::File::create(dir.join(name)).unwrap();
        f.write_all(body.as_bytes()).unwrap();
    }

    #[test]
    fn parses_both_timestamp_forms() {
        let a = parse_timestamp("2024-03-01T12:00:00Z").unwrap();
        let b = parse_timestamp("1709294400000").unwrap();
        assert_eq!(a, b);
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn load_sorts_dedupes_and_takes_latest() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            dir.path(),
            "BTCUSDT_1h.csv",
            "timestamp,open,high,low,close,volume\n\
             2024-03-01T02:00:00Z,102,103,101,102.5,10\n\
             2024-03-01T00:00:00Z,100,101,99,100.5,10\n\
             1709254800000,101,102,100,101.5,10\n\
             2024-03-01T00:00:00Z,1,1,1,1,1\n",
        );
        let source = CsvSource::new(dir.path());
        let all = source.load("BTCUSDT", Timeframe::H1).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].close, 100.5);
        assert_eq!(all[1].close, 101.5);
        assert_eq!(all[2].close, 102.5);

        let latest = source.fetch_series("BTCUSDT", Timeframe::H1, 2).unwrap();
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].close, 101.5);
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = CsvSource::new(dir.path())
            .fetch_series("ETHUSDT", Timeframe::M5, 10)
            .unwrap_err();
        assert!(matches!(err, DataError::NotFound { .. }));
    }

    #[test]
    fn bad_rows_are_malformed() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            dir.path(),
            "ETHUSDT_1h.csv",
            "timestamp,open,high,low,close,volume\nnot-a-time,1,1,1,1,1\n",
        );
        let err = CsvSource::new(dir.path()).load("ETHUSDT", Timeframe::H1).unwrap_err();
        assert!(matches!(err, DataError::Malformed { .. }));
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let source = CsvSource::new(dir.path().join("nested"));
        let base = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let candles: Vec<Candle> = (0..5)
            .map(|i| Candle {
                timestamp: base + chrono::Duration::minutes(15 * i),
                open: 10.0,
                high: 11.0,
                low: 9.0,
                close: 10.0 + i as f64,
                volume: 3.0,
            })
            .collect();
        source.save("SOLUSDT", Timeframe::M15, &candles).unwrap();
        assert_eq!(source.load("SOLUSDT", Timeframe::M15).unwrap(), candles);
    }
}
