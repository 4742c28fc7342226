//! Volume ratio: current volume over its trailing 20-candle average.

use super::sma::sma_of_series;
use crate::domain::Candle;

pub const VOLUME_AVERAGE_PERIOD: usize = 20;

/// `volume[i] / SMA20(volume)[i]`, or `1.0` where the average is undefined or not positive.
pub fn volume_ratio(candles: &[Candle]) -> Vec<f64> {
    let volumes: Vec<f64> = candles.iter().map(|c| c.volume).collect();
    let average = sma_of_series(&volumes, VOLUME_AVERAGE_PERIOD);
    volumes
        .iter()
        .zip(&average)
        .map(|(&v, &avg)| if avg > 0.0 { v / avg } else { 1.0 })
        .collect()
}
