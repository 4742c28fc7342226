//! Moving Average Convergence Divergence (MACD).
//!
//! macd = EMA_fast(close) - EMA_slow(close); signal = EMA_signal(macd).
//! The signal EMA starts once `signal` defined MACD values exist, so the first
//! defined signal sits at index `slow + signal - 2`.

use super::ema::ema_of_series;
use crate::domain::Candle;

pub const DEFAULT_FAST: usize = 12;
pub const DEFAULT_SLOW: usize = 26;
pub const DEFAULT_SIGNAL: usize = 9;

/// Parallel MACD series, one value per candle.
#[derive(Debug, Clone, PartialEq)]
pub struct MacdSeries {
    pub macd: Vec<f64>,
    pub signal: Vec<f64>,
    /// `Some(1)` on a bullish cross, `Some(-1)` on a bearish cross, `Some(0)`
    /// otherwise, `None` while either line is undefined.
    pub crossover: Vec<Option<i8>>,
}

impl MacdSeries {
    pub fn histogram(&self, index: usize) -> f64 {
        self.macd[index] - self.signal[index]
    }
}

/// Compute MACD, its signal line and the crossover markers.
pub fn macd(candles: &[Candle], fast: usize, slow: usize, signal: usize) -> MacdSeries {
    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let fast_ema = ema_of_series(&closes, fast);
    let slow_ema = ema_of_series(&closes, slow);

    let macd_line: Vec<f64> = fast_ema
        .iter()
        .zip(&slow_ema)
        .map(|(f, s)| f - s)
        .collect();
    let signal_line = ema_of_series(&macd_line, signal);
    let crossover = macd_crossovers(&macd_line, &signal_line);

    MacdSeries {
        macd: macd_line,
        signal: signal_line,
        crossover,
    }
}

/// Crossover markers from a MACD line and its signal line.
pub fn macd_crossovers(macd_line: &[f64], signal_line: &[f64]) -> Vec<Option<i8>> {
    let diff: Vec<f64> = macd_line
        .iter()
        .zip(signal_line)
        .map(|(m, s)| m - s)
        .collect();

    let mut markers = vec![None; diff.len()];
    for i in 0..diff.len() {
        let now = diff[i];
        if now.is_nan() {
            continue;
        }
        let prev = if i == 0 { f64::NAN } else { diff[i - 1] };
        markers[i] = Some(if prev.is_nan() {
            0
        } else if now > 0.0 && prev <= 0.0 {
            1
        } else if now < 0.0 && prev >= 0.0 {
            -1
        } else {
            0
        });
    }
    markers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_candles, DEFAULT_EPSILON};

    #[test]
    fn macd_warmup_positions() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + (i as f64 * 0.3).sin() * 5.0).collect();
        let candles = make_candles(&closes);
        let out = macd(&candles, DEFAULT_FAST, DEFAULT_SLOW, DEFAULT_SIGNAL);

        assert!(out.macd[24].is_nan());
        assert!(!out.macd[25].is_nan());
        assert!(out.signal[32].is_nan());
        assert!(!out.signal[33].is_nan());
        assert_eq!(out.crossover[32], None);
        assert!(out.crossover[33].is_some());
    }

    #[test]
    fn macd_constant_series_is_zero() {
        let candles = make_candles(&[50.0; 40]);
        let out = macd(&candles, 3, 6, 3);
        for i in 7..40 {
            assert_approx(out.macd[i], 0.0, DEFAULT_EPSILON);
            assert_approx(out.signal[i], 0.0, DEFAULT_EPSILON);
        }
    }

    #[test]
    fn crossover_markers() {
        let macd_line = [f64::NAN, -1.0, -0.5, 0.5, 1.0, 0.0, -0.2, -0.1];
        let signal_line = [f64::NAN, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        let markers = macd_crossovers(&macd_line, &signal_line);
        assert_eq!(
            markers,
            vec![None, Some(0), Some(0), Some(1), Some(0), Some(0), Some(-1), Some(0)]
        );
    }

    #[test]
    fn crossover_from_zero() {
        // Touching zero then going positive counts as a bullish cross.
        let markers = macd_crossovers(&[0.0, 0.3], &[0.0, 0.0]);
        assert_eq!(markers, vec![Some(0), Some(1)]);
    }

    #[test]
    fn uptrend_macd_positive() {
        let closes: Vec<f64> = (0..50).map(|i| 100.0 + i as f64).collect();
        let out = macd(&make_candles(&closes), 12, 26, 9);
        assert!(out.macd[49] > 0.0);
        assert!(out.signal[49] > 0.0);
        assert!(out.histogram(49).is_finite());
    }
}
