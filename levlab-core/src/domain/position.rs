use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single open long position.
///
/// Every field is fixed at entry. Exits clear the position instead of mutating it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    /// Slippage-adjusted fill price.
    pub entry_price: f64,
    pub entry_time: DateTime<Utc>,
    pub quantity: f64,
    /// Leveraged notional at entry (quantity × entry price).
    pub value: f64,
    /// Capital committed before leverage.
    pub margin: f64,
    pub entry_commission: f64,
    pub stop_loss_price: f64,
    pub take_profit_price: f64,
    pub max_hold_until: DateTime<Utc>,
}

impl Position {
    /// Leveraged P&L if the position were closed at `price`, before commissions.
    pub fn unrealized_pnl(&self, price: f64, leverage: f64) -> f64 {
        if self.entry_price == 0.0 {
            return 0.0;
        }
        self.margin * ((price - self.entry_price) / self.entry_price) * leverage
    }

    /// Margin plus unrealized P&L at `price`.
    pub fn mark_value(&self, price: f64, leverage: f64) -> f64 {
        self.margin + self.unrealized_pnl(price, leverage)
    }
}
