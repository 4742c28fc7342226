//! Engine state, fill arithmetic, and run result types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{Candle, EquityPoint, ExitReason, Position, TradeRecord, TradeSide};
use crate::strategy::RiskLimits;

use super::config::EngineConfig;

/// Mutable state that evolves candle-by-candle during one run.
///
/// A fresh state is created per run; nothing carries over between runs.
#[derive(Debug, Clone)]
pub struct EngineState {
    config: EngineConfig,
    symbol: String,
    pub balance: f64,
    pub position: Option<Position>,
    pub trades: Vec<TradeRecord>,
    pub equity_curve: Vec<EquityPoint>,
}

impl EngineState {
    pub fn new(config: EngineConfig, symbol: impl Into<String>) -> Self {
        Self {
            balance: config.initial_balance,
            config,
            symbol: symbol.into(),
            position: None,
            trades: Vec::new(),
            equity_curve: Vec::new(),
        }
    }

    pub fn has_position(&self) -> bool {
        self.position.is_some()
    }

    /// Open a long at the candle close. Returns false when the balance cannot
    /// cover margin plus commission, in which case nothing changes.
    pub fn open(&mut self, candle: &Candle, limits: &RiskLimits) -> bool {
        if self.position.is_some() {
            return false;
        }
        let cfg = &self.config;
        let fill = cfg.buy_fill(candle.close);
        if fill.is_nan() || fill <= 0.0 {
            return false;
        }

        let mut value = self.balance * cfg.balance_ratio * cfg.leverage;
        let mut quantity = value / fill;
        if quantity < cfg.min_quantity {
            quantity = cfg.min_quantity;
            value = quantity * fill;
        }
        let margin = value / cfg.leverage;
        let commission = value * cfg.commission_rate;

        if self.balance < margin + commission {
            debug!(
                symbol = %self.symbol,
                balance = self.balance,
                required = margin + commission,
                "entry skipped: insufficient balance"
            );
            return false;
        }
        self.balance -= margin + commission;

        let position = Position {
            symbol: self.symbol.clone(),
            entry_price: fill,
            entry_time: candle.timestamp,
            quantity,
            value,
            margin,
            entry_commission: commission,
            stop_loss_price: fill * (1.0 + limits.stop_loss),
            take_profit_price: fill * (1.0 + limits.take_profit),
            max_hold_until: limits.deadline_from(candle.timestamp),
        };

        debug!(
            symbol = %self.symbol,
            price = fill,
            quantity,
            margin,
            "opened long"
        );

        self.trades.push(TradeRecord {
            timestamp: candle.timestamp,
            side: TradeSide::Buy,
            symbol: self.symbol.clone(),
            price: fill,
            amount: quantity,
            value,
            margin: Some(margin),
            commission,
            pnl: None,
            pnl_pct: None,
            exit_reason: None,
            balance: self.balance,
        });
        self.position = Some(position);
        true
    }

    /// Close the open position at the candle close. No-op when flat.
    pub fn close(&mut self, candle: &Candle, reason: ExitReason) -> Option<&TradeRecord> {
        let position = self.position.take()?;
        let cfg = &self.config;
        let exit = cfg.sell_fill(candle.close);

        let gross = position.unrealized_pnl(exit, cfg.leverage);
        let exit_commission = position.quantity * exit * cfg.commission_rate;
        self.balance += position.margin + gross - exit_commission;

        let pnl = gross - position.entry_commission - exit_commission;
        let pnl_pct = if position.margin > 0.0 {
            pnl / position.margin * 100.0
        } else {
            0.0
        };

        debug!(
            symbol = %self.symbol,
            price = exit,
            pnl,
            reason = %reason,
            "closed long"
        );

        self.trades.push(TradeRecord {
            timestamp: candle.timestamp,
            side: TradeSide::Sell,
            symbol: self.symbol.clone(),
            price: exit,
            amount: position.quantity,
            value: position.quantity * exit,
            margin: None,
            commission: exit_commission,
            pnl: Some(pnl),
            pnl_pct: Some(pnl_pct),
            exit_reason: Some(reason),
            balance: self.balance,
        });
        self.trades.last()
    }

    /// Mark value of the open position at `close` (0 when flat).
    pub fn position_value(&self, close: f64) -> f64 {
        self.position
            .as_ref()
            .map(|p| p.mark_value(close, self.config.leverage))
            .unwrap_or(0.0)
    }

    pub fn equity(&self, close: f64) -> f64 {
        self.balance + self.position_value(close)
    }

    /// Append an equity point for this candle.
    pub fn mark(&mut self, candle: &Candle) {
        let position_value = self.position_value(candle.close);
        self.equity_curve.push(EquityPoint {
            timestamp: candle.timestamp,
            equity: self.balance + position_value,
            balance: self.balance,
            position_value,
        });
    }

    pub fn into_result(self) -> RunResult {
        RunResult {
            initial_balance: self.config.initial_balance,
            final_balance: self.balance,
            trades: self.trades,
            equity_curve: self.equity_curve,
        }
    }
}

/// Output of one engine run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub trades: Vec<TradeRecord>,
    pub equity_curve: Vec<EquityPoint>,
    pub initial_balance: f64,
    pub final_balance: f64,
}

impl RunResult {
    pub fn period(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let first = self.equity_curve.first()?;
        let last = self.equity_curve.last()?;
        Some((first.timestamp, last.timestamp))
    }
}
