//! Per-position exit rules checked before the strategy sees the candle.

use chrono::{DateTime, Utc};

use crate::domain::{ExitReason, Position};

/// Evaluates forced exits for an open position.
///
/// Order matters: stop-loss, then take-profit, then max holding time. The first
/// breached rule wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct RiskManager;

impl RiskManager {
    pub fn check(&self, position: &Position, close: f64, now: DateTime<Utc>) -> Option<ExitReason> {
        if close <= position.stop_loss_price {
            Some(ExitReason::StopLoss)
        } else if close >= position.take_profit_price {
            Some(ExitReason::TakeProfit)
        } else if now >= position.max_hold_until {
            Some(ExitReason::MaxHoldTime)
        } else {
            None
        }
    }
}
