//! Backtest runner — wires together parameter validation, engine, and metrics.
//!
//! `run_backtest()` takes a pre-loaded series and performs no I/O; the
//! optimizer, the live session and the CLI all go through it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use levlab_core::data::DataError;
use levlab_core::domain::{Candle, EquityPoint, Timeframe, TradeRecord};
use levlab_core::engine::{self, EngineConfig};
use levlab_core::strategy::{ParamError, Strategy, StrategyKind, StrategyParams};

use crate::metrics::Scorecard;

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(#[from] ParamError),
    #[error("data unavailable: {0}")]
    DataUnavailable(#[from] DataError),
}

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// Complete result of a single backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub scorecard: Scorecard,
    pub trades: Vec<TradeRecord>,
    pub equity_curve: Vec<EquityPoint>,
    /// Effective parameters: defaults merged with the caller's overrides.
    pub params: StrategyParams,
    pub strategy: StrategyKind,
    pub symbol: String,
    pub timeframe: Timeframe,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Validate the parameters, run the engine once and score the run.
///
/// Parameter and configuration errors are raised before any candle is
/// processed. A series shorter than the strategy's warm-up is not an error:
/// it simply produces no trades.
pub fn run_backtest(
    series: &[Candle],
    symbol: &str,
    timeframe: Timeframe,
    kind: StrategyKind,
    overrides: &StrategyParams,
    config: &EngineConfig,
) -> Result<BacktestResult, RunError> {
    config.validate()?;
    let strategy = Strategy::build(kind, overrides)?;
    Ok(run_prepared(series, symbol, timeframe, &strategy, config))
}

/// Run an already validated strategy. Used by the optimizer's inner loop.
pub(crate) fn run_prepared(
    series: &[Candle],
    symbol: &str,
    timeframe: Timeframe,
    strategy: &Strategy,
    config: &EngineConfig,
) -> BacktestResult {
    let run = engine::run_backtest(series, strategy, config, symbol);
    let scorecard = Scorecard::compute(&run);
    BacktestResult {
        schema_version: SCHEMA_VERSION,
        scorecard,
        trades: run.trades,
        equity_curve: run.equity_curve,
        params: strategy.params(),
        strategy: strategy.kind(),
        symbol: symbol.to_string(),
        timeframe,
    }
}
