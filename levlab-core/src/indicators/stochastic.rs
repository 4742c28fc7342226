//! Stochastic oscillator.
//!
//! raw %K = 100 * (close - lowest_low_k) / (highest_high_k - lowest_low_k)
//! %K = SMA_slowing(raw %K), %D = SMA_d(%K).
//! A zero high-low range leaves raw %K undefined (NaN), and the SMAs carry that forward.

use super::sma::sma_of_series;
use crate::domain::Candle;

pub const DEFAULT_K: usize = 14;
pub const DEFAULT_D: usize = 3;
pub const DEFAULT_SLOWING: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct StochasticSeries {
    pub k: Vec<f64>,
    pub d: Vec<f64>,
}

pub fn stochastic(candles: &[Candle], k_period: usize, d_period: usize, slowing: usize) -> StochasticSeries {
    let n = candles.len();
    let mut raw = vec![f64::NAN; n];

    if k_period >= 1 && n >= k_period {
        for i in (k_period - 1)..n {
            let window = &candles[i + 1 - k_period..=i];
            let lowest = window.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
            let highest = window.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max);
            let range = highest - lowest;
            if range > 0.0 && range.is_finite() {
                raw[i] = 100.0 * (candles[i].close - lowest) / range;
            }
        }
    }

    let k = sma_of_series(&raw, slowing);
    let d = sma_of_series(&k, d_period);
    StochasticSeries { k, d }
}
