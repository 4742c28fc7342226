//! Strategy signal generators.
//!
//! A generator looks at the candle history up to and including `index` plus a
//! has-position flag, and answers BUY, SELL or HOLD. Generators never see
//! balances or fills and have no side effects; the engine owns all state.
//!
//! Strategies form a closed set. [`StrategyKind`] is the persisted identifier,
//! [`Strategy`] the validated, ready-to-run variant.

pub mod ma_crossover;
pub mod params;
pub mod rsi_structure;

pub use ma_crossover::{MaCrossover, MaCrossoverParams};
pub use params::{ParamError, RiskLimits, StrategyParams};
pub use rsi_structure::{RsiStructure, RsiStructureParams};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::{Candle, ExitReason};

/// What the generator wants done at this step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    Buy,
    Sell,
    Hold,
}

/// A generator's answer for one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub action: Action,
    /// Reason attached to a SELL; the engine falls back to `Signal`.
    pub exit_reason: Option<ExitReason>,
}

impl Decision {
    pub fn hold() -> Self {
        Self {
            action: Action::Hold,
            exit_reason: None,
        }
    }

    pub fn buy() -> Self {
        Self {
            action: Action::Buy,
            exit_reason: None,
        }
    }

    pub fn sell(reason: ExitReason) -> Self {
        Self {
            action: Action::Sell,
            exit_reason: Some(reason),
        }
    }
}

/// Trait for signal generators.
///
/// # Architecture invariant
/// `evaluate` must only read `candles[..=index]`. Insufficient history or an
/// undefined indicator value yields HOLD, never an error.
pub trait SignalGenerator: Send + Sync {
    /// Human-readable name (e.g., "ma_crossover").
    fn name(&self) -> &str;

    /// First candle index at which the generator may act; earlier indices HOLD.
    fn min_history(&self) -> usize;

    /// Per-position exit thresholds the engine enforces while LONG.
    fn risk_limits(&self) -> RiskLimits;

    fn evaluate(&self, candles: &[Candle], index: usize, has_position: bool) -> Decision;
}

// ─── Strategy identifier ─────────────────────────────────────────────

/// Persisted strategy identifier (`"ma"` / `"rsi"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    Ma,
    Rsi,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 2] = [StrategyKind::Ma, StrategyKind::Rsi];

    pub fn id(&self) -> &'static str {
        match self {
            StrategyKind::Ma => "ma",
            StrategyKind::Rsi => "rsi",
        }
    }

    pub fn default_params(&self) -> StrategyParams {
        match self {
            StrategyKind::Ma => MaCrossoverParams::default().to_params(),
            StrategyKind::Rsi => RsiStructureParams::default().to_params(),
        }
    }

    pub fn param_names(&self) -> &'static [&'static str] {
        match self {
            StrategyKind::Ma => MaCrossoverParams::NAMES,
            StrategyKind::Rsi => RsiStructureParams::NAMES,
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for StrategyKind {
    type Err = ParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ma" => Ok(StrategyKind::Ma),
            "rsi" => Ok(StrategyKind::Rsi),
            _ => Err(ParamError::UnknownStrategy(s.to_string())),
        }
    }
}

// ─── Closed strategy set ─────────────────────────────────────────────

/// A validated strategy ready to drive the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Strategy {
    MaCrossover(MaCrossover),
    RsiStructure(RsiStructure),
}

impl Strategy {
    /// Merge `overrides` over the strategy's defaults and validate the result.
    pub fn build(kind: StrategyKind, overrides: &StrategyParams) -> Result<Self, ParamError> {
        overrides.check_names(kind.id(), kind.param_names())?;
        let params = kind.default_params().merged(overrides);
        match kind {
            StrategyKind::Ma => Ok(Strategy::MaCrossover(MaCrossover::new(
                MaCrossoverParams::from_params(&params)?,
            ))),
            StrategyKind::Rsi => Ok(Strategy::RsiStructure(RsiStructure::new(
                RsiStructureParams::from_params(&params)?,
            ))),
        }
    }

    pub fn kind(&self) -> StrategyKind {
        match self {
            Strategy::MaCrossover(_) => StrategyKind::Ma,
            Strategy::RsiStructure(_) => StrategyKind::Rsi,
        }
    }

    /// The full, merged parameter map this strategy runs with.
    pub fn params(&self) -> StrategyParams {
        match self {
            Strategy::MaCrossover(s) => s.params().to_params(),
            Strategy::RsiStructure(s) => s.params().to_params(),
        }
    }

    fn generator(&self) -> &dyn SignalGenerator {
        match self {
            Strategy::MaCrossover(s) => s,
            Strategy::RsiStructure(s) => s,
        }
    }
}

impl SignalGenerator for Strategy {
    fn name(&self) -> &str {
        self.generator().name()
    }

    fn min_history(&self) -> usize {
        self.generator().min_history()
    }

    fn risk_limits(&self) -> RiskLimits {
        self.generator().risk_limits()
    }

    fn evaluate(&self, candles: &[Candle], index: usize, has_position: bool) -> Decision {
        self.generator().evaluate(candles, index, has_position)
    }
}
