//! Moving average crossover with golden cross entry and death cross exit.
//!
//! BUY when flat and the short SMA crosses above the long SMA
//! (`short_prev <= long_prev && short > long`). SELL when holding on the mirror
//! cross. Both SMAs are windowed, so only the trailing `long + 1` closes are read.

use serde::{Deserialize, Serialize};

use crate::domain::{Candle, ExitReason};
use crate::indicators::sma_of_series;

use super::params::{ParamError, RiskLimits, StrategyParams};
use super::{Decision, SignalGenerator};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaCrossoverParams {
    pub short_period: usize,
    pub long_period: usize,
    pub risk: RiskLimits,
}

impl Default for MaCrossoverParams {
    fn default() -> Self {
        Self {
            short_period: 5,
            long_period: 20,
            risk: RiskLimits {
                stop_loss: -0.02,
                take_profit: 0.03,
                max_hold_hours: 24.0,
            },
        }
    }
}

impl MaCrossoverParams {
    pub const NAMES: &'static [&'static str] = &[
        "short_period",
        "long_period",
        "stop_loss",
        "take_profit",
        "max_hold_hours",
    ];

    pub fn from_params(params: &StrategyParams) -> Result<Self, ParamError> {
        let short_period = params.require_period("short_period")?;
        let long_period = params.require_period("long_period")?;
        if short_period >= long_period {
            return Err(ParamError::out_of_range(
                "short_period",
                short_period as f64,
                format!("must be < long_period ({long_period})"),
            ));
        }
        Ok(Self {
            short_period,
            long_period,
            risk: RiskLimits::from_params(params)?,
        })
    }

    pub fn to_params(&self) -> StrategyParams {
        let params = StrategyParams::new()
            .with("short_period", self.short_period as f64)
            .with("long_period", self.long_period as f64);
        self.risk.write_into(params)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MaCrossover {
    params: MaCrossoverParams,
}

impl MaCrossover {
    pub fn new(params: MaCrossoverParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &MaCrossoverParams {
        &self.params
    }
}

impl SignalGenerator for MaCrossover {
    fn name(&self) -> &str {
        "ma_crossover"
    }

    fn min_history(&self) -> usize {
        self.params.short_period.max(self.params.long_period) + 5
    }

    fn risk_limits(&self) -> RiskLimits {
        self.params.risk
    }

    fn evaluate(&self, candles: &[Candle], index: usize, has_position: bool) -> Decision {
        if index >= candles.len() || index < self.min_history() {
            return Decision::hold();
        }

        let span = self.params.long_period.max(self.params.short_period) + 1;
        let start = index + 1 - span;
        let closes: Vec<f64> = candles[start..=index].iter().map(|c| c.close).collect();

        let short = sma_of_series(&closes, self.params.short_period);
        let long = sma_of_series(&closes, self.params.long_period);
        let last = closes.len() - 1;
        let (short_now, short_prev) = (short[last], short[last - 1]);
        let (long_now, long_prev) = (long[last], long[last - 1]);

        if short_now.is_nan() || short_prev.is_nan() || long_now.is_nan() || long_prev.is_nan() {
            return Decision::hold();
        }

        if !has_position && short_prev <= long_prev && short_now > long_now {
            return Decision::buy();
        }
        if has_position && short_prev >= long_prev && short_now < long_now {
            return Decision::sell(ExitReason::Signal);
        }
        Decision::hold()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::make_candles;
    use crate::strategy::Action;

    fn strategy(short: usize, long: usize) -> MaCrossover {
        MaCrossover::new(MaCrossoverParams {
            short_period: short,
            long_period: long,
            ..MaCrossoverParams::default()
        })
    }

    /// Flat, then a sharp rise that drags the short SMA above the long one.
    fn golden_cross_series() -> Vec<f64> {
        let mut closes = vec![100.0; 12];
        closes.extend([101.0, 103.0, 106.0, 110.0]);
        closes
    }

    #[test]
    fn holds_before_min_history() {
        let s = strategy(2, 5);
        assert_eq!(s.min_history(), 10);
        let candles = make_candles(&golden_cross_series());
        for i in 0..10 {
            assert_eq!(s.evaluate(&candles, i, false), Decision::hold());
        }
    }

    #[test]
    fn first_action_at_min_history_index() {
        let s = strategy(2, 5);
        // Cross lands on index 9, one short of min_history: still HOLD.
        let mut early = vec![100.0; 9];
        early.push(110.0);
        assert_eq!(s.evaluate(&make_candles(&early), 9, false), Decision::hold());

        // Same cross on index 10 is acted on.
        let mut ready = vec![100.0; 10];
        ready.push(110.0);
        assert_eq!(s.evaluate(&make_candles(&ready), 10, false).action, Action::Buy);
    }

    #[test]
    fn buys_on_golden_cross_when_flat() {
        let s = strategy(2, 5);
        let candles = make_candles(&golden_cross_series());
        // At 12, SMA2 = 100.5 > SMA5 = 100.2, previous step both 100.
        assert_eq!(s.evaluate(&candles, 12, false).action, Action::Buy);
        // Same cross while holding is not an exit.
        assert_eq!(s.evaluate(&candles, 12, true).action, Action::Hold);
        // Already above: no fresh cross.
        assert_eq!(s.evaluate(&candles, 13, false).action, Action::Hold);
    }

    #[test]
    fn sells_on_death_cross_when_holding() {
        let s = strategy(2, 5);
        let mut closes = vec![100.0; 12];
        closes.extend([99.0, 97.0]);
        let candles = make_candles(&closes);
        let d = s.evaluate(&candles, 12, true);
        assert_eq!(d, Decision::sell(ExitReason::Signal));
        assert_eq!(s.evaluate(&candles, 12, false).action, Action::Hold);
    }

    #[test]
    fn decreasing_series_never_buys() {
        let s = MaCrossover::new(MaCrossoverParams::default());
        let closes: Vec<f64> = (0..200).map(|i| 1000.0 - i as f64).collect();
        let candles = make_candles(&closes);
        for i in 0..candles.len() {
            assert_ne!(s.evaluate(&candles, i, false).action, Action::Buy);
        }
    }

    #[test]
    fn params_validation() {
        let ok = MaCrossoverParams::default().to_params();
        assert!(MaCrossoverParams::from_params(&ok).is_ok());
        let inverted = ok.clone().with("short_period", 20.0);
        assert!(MaCrossoverParams::from_params(&inverted).is_err());
        let fractional = ok.clone().with("long_period", 20.5);
        assert!(matches!(
            MaCrossoverParams::from_params(&fractional),
            Err(ParamError::NotAPeriod { .. })
        ));
        let huge = ok.clone().with("long_period", 1e20);
        assert!(matches!(
            MaCrossoverParams::from_params(&huge),
            Err(ParamError::OutOfRange { .. })
        ));
        let long_hold = ok.with("max_hold_hours", 1e10);
        assert!(matches!(
            MaCrossoverParams::from_params(&long_hold),
            Err(ParamError::OutOfRange { .. })
        ));
    }
}
