//! Bundled oscillator set computed once per series.

use super::macd::{macd, DEFAULT_FAST, DEFAULT_SIGNAL, DEFAULT_SLOW};
use super::rsi::rsi_of_series;
use super::stochastic::{stochastic, DEFAULT_D, DEFAULT_K, DEFAULT_SLOWING};
use crate::domain::Candle;

pub const DEFAULT_RSI_PERIOD: usize = 14;

/// RSI, MACD and Stochastic with their default periods, one entry per candle.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSet {
    pub rsi: Vec<f64>,
    pub macd: Vec<f64>,
    pub signal: Vec<f64>,
    pub macd_crossover: Vec<Option<i8>>,
    pub stoch_k: Vec<f64>,
    pub stoch_d: Vec<f64>,
}

impl IndicatorSet {
    pub fn compute(candles: &[Candle]) -> Self {
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let macd = macd(candles, DEFAULT_FAST, DEFAULT_SLOW, DEFAULT_SIGNAL);
        let stoch = stochastic(candles, DEFAULT_K, DEFAULT_D, DEFAULT_SLOWING);
        Self {
            rsi: rsi_of_series(&closes, DEFAULT_RSI_PERIOD),
            macd: macd.macd,
            signal: macd.signal,
            macd_crossover: macd.crossover,
            stoch_k: stoch.k,
            stoch_d: stoch.d,
        }
    }

    pub fn len(&self) -> usize {
        self.rsi.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rsi.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::make_candles;

    #[test]
    fn lengths_match_input() {
        let closes: Vec<f64> = (0..50).map(|i| 100.0 + (i % 7) as f64).collect();
        let set = IndicatorSet::compute(&make_candles(&closes));
        assert_eq!(set.len(), 50);
        assert_eq!(set.macd.len(), 50);
        assert_eq!(set.macd_crossover.len(), 50);
        assert_eq!(set.stoch_d.len(), 50);
    }

    #[test]
    fn empty_series() {
        let set = IndicatorSet::compute(&[]);
        assert!(set.is_empty());
    }

    #[test]
    fn prefix_agrees_with_full_series() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + (i as f64 * 0.4).cos() * 6.0).collect();
        let candles = make_candles(&closes);
        let full = IndicatorSet::compute(&candles);
        let prefix = IndicatorSet::compute(&candles[..=45]);
        let same = |a: f64, b: f64| (a.is_nan() && b.is_nan()) || (a - b).abs() < 1e-9;
        assert!(same(full.rsi[45], prefix.rsi[45]));
        assert!(same(full.macd[45], prefix.macd[45]));
        assert!(same(full.signal[45], prefix.signal[45]));
        assert!(same(full.stoch_k[45], prefix.stoch_k[45]));
        assert!(same(full.stoch_d[45], prefix.stoch_d[45]));
        assert_eq!(full.macd_crossover[45], prefix.macd_crossover[45]);
    }
}
