//! Candle-by-candle event loop.
//!
//! Per candle:
//! 1. If LONG, the risk manager may force an exit at the close. A forced exit
//!    ends the step's decision making.
//! 2. Otherwise the strategy is evaluated with the current has-position flag.
//! 3. BUY while FLAT opens, SELL while LONG closes; anything else is ignored.
//! 4. An equity point is recorded.
//!
//! After the last candle any open position is closed as a final liquidation.

use tracing::debug;

use crate::domain::{Candle, ExitReason};
use crate::strategy::{Action, SignalGenerator};

use super::config::EngineConfig;
use super::risk::RiskManager;
use super::state::{EngineState, RunResult};

/// Run one backtest over `candles`.
///
/// `config` must already be validated; the strategy's own parameters are
/// validated when the strategy is built.
pub fn run_backtest(
    candles: &[Candle],
    strategy: &dyn SignalGenerator,
    config: &EngineConfig,
    symbol: &str,
) -> RunResult {
    let mut state = EngineState::new(*config, symbol);
    let risk = RiskManager;
    let limits = strategy.risk_limits();

    for (i, candle) in candles.iter().enumerate() {
        let forced_exit = state
            .position
            .as_ref()
            .and_then(|p| risk.check(p, candle.close, candle.timestamp));

        if let Some(reason) = forced_exit {
            state.close(candle, reason);
        } else {
            let decision = strategy.evaluate(candles, i, state.has_position());
            match (decision.action, state.has_position()) {
                (Action::Buy, false) => {
                    state.open(candle, &limits);
                }
                (Action::Sell, true) => {
                    state.close(candle, decision.exit_reason.unwrap_or(ExitReason::Signal));
                }
                _ => {}
            }
        }

        state.mark(candle);
    }

    if let Some(last) = candles.last() {
        if state.close(last, ExitReason::FinalLiquidation).is_some() {
            debug!(symbol, "open position liquidated at series end");
            // Keep the curve consistent with the final cash balance.
            if let Some(point) = state.equity_curve.last_mut() {
                point.balance = state.balance;
                point.position_value = 0.0;
                point.equity = state.balance;
            }
        }
    }

    state.into_result()
}
