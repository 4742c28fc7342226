//! Market data source trait and structured error types.
//!
//! The MarketDataSource trait abstracts over where candles come from (CSV
//! files, an in-memory map, an exchange client living outside this workspace)
//! so the optimizer and the live session can be driven by fakes in tests.

use std::collections::HashMap;

use thiserror::Error;

use crate::domain::{canonicalize, Candle, Timeframe};

/// Structured error types for data operations.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("no data for {symbol} {timeframe}")]
    NotFound { symbol: String, timeframe: Timeframe },

    #[error("malformed data for {symbol}: {reason}")]
    Malformed { symbol: String, reason: String },

    #[error("data source unavailable: {0}")]
    Unavailable(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Trait for candle sources.
///
/// Implementations return at most `count` of the most recent candles, sorted
/// by strictly increasing timestamp with duplicates removed.
pub trait MarketDataSource: Send + Sync {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    fn fetch_series(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        count: usize,
    ) -> Result<Vec<Candle>, DataError>;
}

/// Keep the newest `count` candles of an already canonical series.
pub fn take_latest(mut candles: Vec<Candle>, count: usize) -> Vec<Candle> {
    if candles.len() > count {
        candles.drain(..candles.len() - count);
    }
    candles
}

/// In-memory source keyed by (symbol, timeframe). Useful for tests and for
/// callers that already hold candles.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    series: HashMap<(String, Timeframe), Vec<Candle>>,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a series; it is canonicalized on insert.
    pub fn insert(&mut self, symbol: impl Into<String>, timeframe: Timeframe, candles: Vec<Candle>) {
        self.series
            .insert((symbol.into(), timeframe), canonicalize(candles));
    }

    pub fn with_series(
        mut self,
        symbol: impl Into<String>,
        timeframe: Timeframe,
        candles: Vec<Candle>,
    ) -> Self {
        self.insert(symbol, timeframe, candles);
        self
    }
}

impl MarketDataSource for StaticSource {
    fn name(&self) -> &str {
        "static"
    }

    fn fetch_series(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        count: usize,
    ) -> Result<Vec<Candle>, DataError> {
        let candles = self
            .series
            .get(&(symbol.to_string(), timeframe))
            .ok_or_else(|| DataError::NotFound {
                symbol: symbol.to_string(),
                timeframe,
            })?;
        Ok(take_latest(candles.clone(), count))
    }
}
