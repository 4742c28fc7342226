//! Per-symbol strategy selection.
//!
//! Every symbol is optimized independently with each strategy; the better of
//! the two by total return represents the symbol. Symbols are then ranked and
//! the top `size` form the portfolio. There is no cross-asset weighting.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use levlab_core::domain::Timeframe;
use levlab_core::strategy::{StrategyKind, StrategyParams};

use crate::optimizer::{OptimizationOutcome, OptimizeError, Optimizer};

/// One selected symbol and the strategy it will trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioEntry {
    pub symbol: String,
    pub strategy: StrategyKind,
    pub params: StrategyParams,
    pub total_return: f64,
    pub win_rate: f64,
    pub max_drawdown: f64,
}

impl PortfolioEntry {
    fn from_outcome(outcome: &OptimizationOutcome) -> Self {
        Self {
            symbol: outcome.symbol.clone(),
            strategy: outcome.strategy,
            params: outcome.best_params.clone(),
            total_return: outcome.best.total_return,
            win_rate: outcome.best.win_rate,
            max_drawdown: outcome.best.max_drawdown,
        }
    }
}

/// Optimize both strategies for every symbol and keep the best `size`.
///
/// Symbols whose data is unavailable are logged and skipped; cancellation
/// and store failures abort the whole selection.
pub fn select_portfolio(
    optimizer: &Optimizer<'_>,
    symbols: &[String],
    timeframe: Timeframe,
    lookback_days: u32,
    max_combinations: usize,
    size: usize,
) -> Result<Vec<PortfolioEntry>, OptimizeError> {
    let mut entries = Vec::with_capacity(symbols.len());

    for symbol in symbols {
        let mut best: Option<PortfolioEntry> = None;
        for kind in StrategyKind::ALL {
            let outcome = match optimizer.optimize(symbol, timeframe, kind, lookback_days, max_combinations) {
                Ok(outcome) => outcome,
                Err(OptimizeError::DataUnavailable { symbol, reason }) => {
                    warn!(%symbol, %reason, "skipping symbol");
                    break;
                }
                Err(OptimizeError::NoCandidates(kind)) => {
                    warn!(%symbol, strategy = %kind, "no candidates");
                    continue;
                }
                Err(e) => return Err(e),
            };
            let entry = PortfolioEntry::from_outcome(&outcome);
            if best.as_ref().map_or(true, |b| entry.total_return > b.total_return) {
                best = Some(entry);
            }
        }
        if let Some(entry) = best {
            info!(
                symbol = %entry.symbol,
                strategy = %entry.strategy,
                total_return = entry.total_return,
                "symbol evaluated"
            );
            entries.push(entry);
        }
    }

    rank(&mut entries);
    entries.truncate(size);
    Ok(entries)
}

/// Sort by total return, highest first; ties keep input order.
pub fn rank(entries: &mut [PortfolioEntry]) {
    entries.sort_by(|a, b| {
        b.total_return
            .partial_cmp(&a.total_return)
            .unwrap_or(Ordering::Equal)
    });
}
