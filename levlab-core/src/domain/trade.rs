//! Append-only ledger entries, one per open or close.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Side of a ledger entry. The engine is long-only, so Buy opens and Sell closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeSide::Buy => f.write_str("BUY"),
            TradeSide::Sell => f.write_str("SELL"),
        }
    }
}

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    /// The strategy emitted SELL.
    Signal,
    StopLoss,
    TakeProfit,
    MaxHoldTime,
    /// Closed at the last candle because the series ended.
    FinalLiquidation,
}

impl ExitReason {
    pub fn label(&self) -> &'static str {
        match self {
            ExitReason::Signal => "signal",
            ExitReason::StopLoss => "stop_loss",
            ExitReason::TakeProfit => "take_profit",
            ExitReason::MaxHoldTime => "max_hold_time",
            ExitReason::FinalLiquidation => "final_liquidation",
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Ledger entry for an open (Buy) or a close (Sell).
///
/// `margin` is set on opens; `pnl`, `pnl_pct` and `exit_reason` on closes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub timestamp: DateTime<Utc>,
    pub side: TradeSide,
    pub symbol: String,
    /// Fill price, slippage included.
    pub price: f64,
    pub amount: f64,
    /// Notional of the fill (amount × price).
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub margin: Option<f64>,
    pub commission: f64,
    /// Realized P&L net of entry and exit commissions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pnl: Option<f64>,
    /// Realized P&L as a percentage of margin.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pnl_pct: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_reason: Option<ExitReason>,
    /// Cash balance after this entry was applied.
    pub balance: f64,
}

impl TradeRecord {
    pub fn is_open(&self) -> bool {
        self.side == TradeSide::Buy
    }

    pub fn is_close(&self) -> bool {
        self.side == TradeSide::Sell
    }

    pub fn is_winner(&self) -> bool {
        self.pnl.is_some_and(|p| p > 0.0)
    }

    pub fn is_final_liquidation(&self) -> bool {
        self.exit_reason == Some(ExitReason::FinalLiquidation)
    }
}
