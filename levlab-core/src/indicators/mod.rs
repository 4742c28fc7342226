//! Indicator library.
//!
//! Indicators are pure functions: candle history in, numeric series out, one value
//! per candle. Values before an indicator's warm-up window are `f64::NAN`, and so is
//! any value whose formula would divide by zero. Nothing in this module panics or
//! returns an error on short or malformed input.
//!
//! Single-series indicators implement [`Indicator`]. Composite indicators (MACD,
//! Stochastic) are free functions returning a small struct of parallel series.

pub mod ema;
pub mod macd;
pub mod pivots;
pub mod rsi;
pub mod set;
pub mod sma;
pub mod stochastic;
pub mod volume;

pub use ema::{ema_of_series, Ema};
pub use macd::{macd, macd_crossovers, MacdSeries};
pub use pivots::{find_pivots, nearest_support, PivotPoint};
pub use rsi::{rsi_of_series, Rsi};
pub use set::IndicatorSet;
pub use sma::{sma_of_series, Sma};
pub use stochastic::{stochastic, StochasticSeries};
pub use volume::volume_ratio;

use crate::domain::Candle;

/// Trait for single-series indicators.
///
/// # Look-ahead contamination guard
/// No indicator value at index t may depend on candles after t. Computing over
/// `candles[..=t]` and over the full series must agree at t.
pub trait Indicator: Send + Sync {
    /// Human-readable name (e.g., "sma_20", "rsi_14").
    fn name(&self) -> &str;

    /// Number of candles needed before the indicator produces valid output.
    fn lookback(&self) -> usize;

    /// Compute the indicator for the entire series.
    ///
    /// Returns a `Vec<f64>` of the same length as `candles`.
    fn compute(&self, candles: &[Candle]) -> Vec<f64>;
}

/// Create synthetic hourly candles from close prices for testing.
///
/// Generates plausible OHLV: open = prev_close (or close for first candle),
/// high = max(open,close) + 1.0, low = min(open,close) - 1.0, volume = 1000.
#[cfg(test)]
pub fn make_candles(closes: &[f64]) -> Vec<Candle> {
    use chrono::{Duration, TimeZone, Utc};
    let base = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Candle {
                timestamp: base + Duration::hours(i as i64),
                open,
                high: open.max(close) + 1.0,
                low: open.min(close) - 1.0,
                close,
                volume: 1000.0,
            }
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
