//! RSI + market structure: buy oversold dips that are turning up near support.
//!
//! BUY when flat and all of:
//! - RSI below `rsi_buy` and rising versus the previous step,
//! - a support level exists and close is within `support_distance` above it,
//! - volume ratio above `volume_ratio`.
//!
//! SELL when holding and RSI exceeds `rsi_sell`.

use serde::{Deserialize, Serialize};

use crate::domain::{Candle, ExitReason};
use crate::indicators::volume::VOLUME_AVERAGE_PERIOD;
use crate::indicators::{nearest_support, rsi_of_series, volume_ratio};

use super::params::{ParamError, RiskLimits, StrategyParams};
use super::{Decision, SignalGenerator};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RsiStructureParams {
    pub rsi_period: usize,
    pub rsi_buy: f64,
    pub rsi_sell: f64,
    pub volume_ratio: f64,
    pub support_distance: f64,
    pub risk: RiskLimits,
}

impl Default for RsiStructureParams {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            rsi_buy: 30.0,
            rsi_sell: 70.0,
            volume_ratio: 0.8,
            support_distance: 0.02,
            risk: RiskLimits {
                stop_loss: -0.015,
                take_profit: 0.03,
                max_hold_hours: 24.0,
            },
        }
    }
}

impl RsiStructureParams {
    pub const NAMES: &'static [&'static str] = &[
        "rsi_period",
        "rsi_buy",
        "rsi_sell",
        "stop_loss",
        "take_profit",
        "max_hold_hours",
        "volume_ratio",
        "support_distance",
    ];

    pub fn from_params(params: &StrategyParams) -> Result<Self, ParamError> {
        let rsi_period = params.require_period("rsi_period")?;

        let rsi_buy = params.require("rsi_buy")?;
        let rsi_sell = params.require("rsi_sell")?;
        for (name, value) in [("rsi_buy", rsi_buy), ("rsi_sell", rsi_sell)] {
            if !(0.0..=100.0).contains(&value) {
                return Err(ParamError::out_of_range(name, value, "must be in [0, 100]"));
            }
        }
        if rsi_buy >= rsi_sell {
            return Err(ParamError::out_of_range(
                "rsi_buy",
                rsi_buy,
                format!("must be < rsi_sell ({rsi_sell})"),
            ));
        }

        let volume_ratio = params.require("volume_ratio")?;
        if volume_ratio < 0.0 {
            return Err(ParamError::out_of_range(
                "volume_ratio",
                volume_ratio,
                "must be >= 0",
            ));
        }
        let support_distance = params.require("support_distance")?;
        if support_distance < 0.0 {
            return Err(ParamError::out_of_range(
                "support_distance",
                support_distance,
                "must be >= 0",
            ));
        }

        Ok(Self {
            rsi_period,
            rsi_buy,
            rsi_sell,
            volume_ratio,
            support_distance,
            risk: RiskLimits::from_params(params)?,
        })
    }

    pub fn to_params(&self) -> StrategyParams {
        let params = StrategyParams::new()
            .with("rsi_period", self.rsi_period as f64)
            .with("rsi_buy", self.rsi_buy)
            .with("rsi_sell", self.rsi_sell)
            .with("volume_ratio", self.volume_ratio)
            .with("support_distance", self.support_distance);
        self.risk.write_into(params)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RsiStructure {
    params: RsiStructureParams,
}

impl RsiStructure {
    pub fn new(params: RsiStructureParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &RsiStructureParams {
        &self.params
    }

    /// RSI at `index` and `index - 1`, from the trailing `period + 2` closes.
    fn rsi_pair(&self, candles: &[Candle], index: usize) -> (f64, f64) {
        let span = self.params.rsi_period + 2;
        let start = (index + 1).saturating_sub(span);
        let closes: Vec<f64> = candles[start..=index].iter().map(|c| c.close).collect();
        let rsi = rsi_of_series(&closes, self.params.rsi_period);
        let last = rsi.len() - 1;
        let prev = if last == 0 { f64::NAN } else { rsi[last - 1] };
        (rsi[last], prev)
    }

    fn volume_ratio_at(&self, candles: &[Candle], index: usize) -> f64 {
        let start = (index + 1).saturating_sub(VOLUME_AVERAGE_PERIOD);
        volume_ratio(&candles[start..=index])
            .last()
            .copied()
            .unwrap_or(1.0)
    }
}

impl SignalGenerator for RsiStructure {
    fn name(&self) -> &str {
        "rsi_structure"
    }

    fn min_history(&self) -> usize {
        (self.params.rsi_period + 1).max(20)
    }

    fn risk_limits(&self) -> RiskLimits {
        self.params.risk
    }

    fn evaluate(&self, candles: &[Candle], index: usize, has_position: bool) -> Decision {
        if index >= candles.len() || index < self.min_history() {
            return Decision::hold();
        }

        let (rsi_now, rsi_prev) = self.rsi_pair(candles, index);
        if rsi_now.is_nan() {
            return Decision::hold();
        }

        if has_position {
            if rsi_now > self.params.rsi_sell {
                return Decision::sell(ExitReason::Signal);
            }
            return Decision::hold();
        }

        if rsi_prev.is_nan() || rsi_now >= self.params.rsi_buy || rsi_now - rsi_prev <= 0.0 {
            return Decision::hold();
        }
        if self.volume_ratio_at(candles, index) <= self.params.volume_ratio {
            return Decision::hold();
        }

        let close = candles[index].close;
        match nearest_support(&candles[..=index]) {
            Some(support) if close <= support * (1.0 + self.params.support_distance) => {
                Decision::buy()
            }
            _ => Decision::hold(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::make_candles;
    use crate::strategy::Action;

    /// Steady decline, a trough around 98, a bounce and a shallow retest.
    ///
    /// make_candles lows are min(open, close) - 1, so candles 22 and 23 are both
    /// pivot lows at 97 and support is 97. The last step is an RSI uptick from
    /// about 14.8 to 22.2 with close 98.5 within 2% of support.
    fn dip_then_rebound() -> Vec<f64> {
        let mut closes: Vec<f64> = (0..20).map(|i| 120.0 - i as f64).collect();
        closes.extend([100.0, 99.0, 98.0, 99.0, 100.0, 99.0, 98.0, 97.5, 98.5]);
        closes
    }

    #[test]
    fn min_history_is_at_least_twenty() {
        assert_eq!(RsiStructure::new(RsiStructureParams::default()).min_history(), 20);
        let long = RsiStructure::new(RsiStructureParams {
            rsi_period: 30,
            ..RsiStructureParams::default()
        });
        assert_eq!(long.min_history(), 31);
    }

    #[test]
    fn holds_on_short_history() {
        let s = RsiStructure::new(RsiStructureParams::default());
        let candles = make_candles(&dip_then_rebound());
        for i in 0..20 {
            assert_eq!(s.evaluate(&candles, i, false), Decision::hold());
        }
    }

    #[test]
    fn buys_on_oversold_uptick_near_support() {
        let s = RsiStructure::new(RsiStructureParams::default());
        let candles = make_candles(&dip_then_rebound());
        let last = candles.len() - 1;

        let (now, prev) = s.rsi_pair(&candles, last);
        assert!(now < 30.0, "rsi {now}");
        assert!(now > prev, "rsi {now} vs {prev}");
        assert_eq!(nearest_support(&candles), Some(97.0));

        assert_eq!(s.evaluate(&candles, last, false).action, Action::Buy);
        assert_eq!(s.evaluate(&candles, last, true).action, Action::Hold);
    }

    #[test]
    fn low_volume_blocks_entry() {
        let s = RsiStructure::new(RsiStructureParams::default());
        let mut candles = make_candles(&dip_then_rebound());
        let last = candles.len() - 1;
        candles[last].volume = 100.0;
        assert_eq!(s.evaluate(&candles, last, false).action, Action::Hold);
    }

    #[test]
    fn sells_when_overbought() {
        let s = RsiStructure::new(RsiStructureParams::default());
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        let candles = make_candles(&closes);
        assert_eq!(
            s.evaluate(&candles, 29, true),
            Decision::sell(ExitReason::Signal)
        );
        assert_eq!(s.evaluate(&candles, 29, false).action, Action::Hold);
    }

    #[test]
    fn flat_prices_hold() {
        // RSI undefined on a flat series.
        let s = RsiStructure::new(RsiStructureParams::default());
        let candles = make_candles(&[100.0; 40]);
        assert_eq!(s.evaluate(&candles, 39, true), Decision::hold());
        assert_eq!(s.evaluate(&candles, 39, false), Decision::hold());
    }

    #[test]
    fn params_validation() {
        let ok = RsiStructureParams::default().to_params();
        assert!(RsiStructureParams::from_params(&ok).is_ok());
        assert!(RsiStructureParams::from_params(&ok.clone().with("rsi_buy", 75.0)).is_err());
        assert!(RsiStructureParams::from_params(&ok.clone().with("rsi_sell", 101.0)).is_err());
        assert!(RsiStructureParams::from_params(&ok.clone().with("volume_ratio", -0.1)).is_err());
        assert!(RsiStructureParams::from_params(&ok.clone().with("support_distance", -0.01)).is_err());
        assert!(RsiStructureParams::from_params(&ok.clone().with("rsi_period", 0.0)).is_err());
        assert!(matches!(
            RsiStructureParams::from_params(&ok.with("rsi_period", 1e20)),
            Err(ParamError::OutOfRange { .. })
        ));
    }
}
