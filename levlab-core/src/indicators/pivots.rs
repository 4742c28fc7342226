//! Pivot points and support detection.
//!
//! A candle is a pivot low when its low is the minimum of the centered window
//! `low[j-2..=j+2]`, and a pivot high analogously. Only windows lying fully
//! inside the slice count, so the last two candles are never pivots.

use serde::{Deserialize, Serialize};

use crate::domain::Candle;

/// Half-width of the centered pivot window (window = 2 * radius + 1 = 5).
pub const PIVOT_RADIUS: usize = 2;

/// Pivot lows considered for support must sit within this many candles of the end.
pub const SUPPORT_RECENCY: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PivotKind {
    High,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PivotPoint {
    pub index: usize,
    pub price: f64,
    pub kind: PivotKind,
}

/// All pivot highs and lows in `candles`, ordered by index (high before low on ties).
pub fn find_pivots(candles: &[Candle]) -> Vec<PivotPoint> {
    let n = candles.len();
    let mut pivots = Vec::new();
    if n < 2 * PIVOT_RADIUS + 1 {
        return pivots;
    }

    for j in PIVOT_RADIUS..(n - PIVOT_RADIUS) {
        if is_pivot_high(candles, j) {
            pivots.push(PivotPoint {
                index: j,
                price: candles[j].high,
                kind: PivotKind::High,
            });
        }
        if is_pivot_low(candles, j) {
            pivots.push(PivotPoint {
                index: j,
                price: candles[j].low,
                kind: PivotKind::Low,
            });
        }
    }
    pivots
}

fn window(candles: &[Candle], j: usize) -> &[Candle] {
    &candles[j - PIVOT_RADIUS..=j + PIVOT_RADIUS]
}

fn is_pivot_high(candles: &[Candle], j: usize) -> bool {
    let max_high = window(candles, j)
        .iter()
        .map(|c| c.high)
        .fold(f64::NEG_INFINITY, f64::max);
    candles[j].high == max_high
}

fn is_pivot_low(candles: &[Candle], j: usize) -> bool {
    let min_low = window(candles, j)
        .iter()
        .map(|c| c.low)
        .fold(f64::INFINITY, f64::min);
    candles[j].low == min_low
}

/// Nearest support: the most recent pivot low among those within the last
/// [`SUPPORT_RECENCY`] candles. Requires at least two pivot lows overall.
///
/// Scans backward from the newest full window and stops as soon as the answer
/// is known, so callers evaluating every step stay cheap on long histories.
pub fn nearest_support(candles: &[Candle]) -> Option<f64> {
    let n = candles.len();
    if n < 2 * PIVOT_RADIUS + 1 {
        return None;
    }

    let cutoff = n.saturating_sub(SUPPORT_RECENCY);
    let mut recent: Option<f64> = None;
    let mut lows_seen = 0usize;

    for j in (PIVOT_RADIUS..(n - PIVOT_RADIUS)).rev() {
        if !is_pivot_low(candles, j) {
            continue;
        }
        lows_seen += 1;
        if j >= cutoff && recent.is_none() {
            recent = Some(candles[j].low);
        }
        if lows_seen >= 2 {
            // Any later low would be older than the cutoff or already seen.
            return recent;
        }
    }
    None
}
