//! Live trading session: one strategy, one symbol, explicit state.
//!
//! Each [`TradingSession::step`] fetches the latest candles, applies the same
//! risk exits as the backtest engine to the tracked position, asks the
//! strategy for a decision and routes any resulting order through an
//! [`OrderSink`]. Every fill is recorded in the session's [`TradeTracker`].
//!
//! The session is long-only, like the engine: SELL closes the tracked
//! position and is ignored when flat.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use levlab_core::data::{DataError, MarketDataSource};
use levlab_core::domain::{ExitReason, Position, Timeframe, TradeSide};
use levlab_core::engine::RiskManager;
use levlab_core::strategy::{Action, SignalGenerator, Strategy};

/// Orders below this notional (quote currency) are not sent.
pub const MIN_ORDER_NOTIONAL: f64 = 50.0;
/// Exchange minimum order quantity.
pub const MIN_ORDER_QUANTITY: f64 = 0.001;
/// Candles fetched per step.
pub const DEFAULT_HISTORY: usize = 100;

// ─── Order sink ─────────────────────────────────────────────────────

/// Exchange acknowledgement of a market order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub order_id: String,
    pub price: f64,
    pub quantity: f64,
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("order rejected: {0}")]
    Rejected(String),
    #[error("order sink unavailable: {0}")]
    Unavailable(String),
}

/// Where live orders go. Implemented outside this workspace for real
/// exchanges; tests use an in-memory fake.
pub trait OrderSink: Send + Sync {
    /// Free quote balance available for new positions.
    fn available_balance(&self) -> Result<f64, SinkError>;

    fn submit(&self, side: TradeSide, symbol: &str, quantity: f64) -> Result<Fill, SinkError>;
}

// ─── Trade tracker ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedTrade {
    pub timestamp: DateTime<Utc>,
    pub side: TradeSide,
    pub symbol: String,
    pub amount: f64,
    pub price: f64,
    pub order_id: String,
    pub value: f64,
}

/// Running summary of a session's fills.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerPerformance {
    pub total_trades: usize,
    pub buy_trades: usize,
    pub sell_trades: usize,
    pub total_buy_value: f64,
    pub total_sell_value: f64,
    pub pnl: f64,
    pub pnl_pct: f64,
    pub avg_trade_value: f64,
    pub trading_hours: f64,
    pub trades_per_hour: f64,
    pub initial_balance: Option<f64>,
    pub current_balance: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeTracker {
    trades: Vec<TrackedTrade>,
    initial_balance: Option<f64>,
    current_balance: Option<f64>,
    started_at: DateTime<Utc>,
}

impl TradeTracker {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            trades: Vec::new(),
            initial_balance: None,
            current_balance: None,
            started_at,
        }
    }

    pub fn record(&mut self, timestamp: DateTime<Utc>, side: TradeSide, symbol: &str, fill: &Fill) {
        info!(%side, symbol, quantity = fill.quantity, price = fill.price, order_id = %fill.order_id, "fill recorded");
        self.trades.push(TrackedTrade {
            timestamp,
            side,
            symbol: symbol.to_string(),
            amount: fill.quantity,
            price: fill.price,
            order_id: fill.order_id.clone(),
            value: fill.quantity * fill.price,
        });
    }

    pub fn set_initial_balance(&mut self, balance: f64) {
        self.initial_balance = Some(balance);
    }

    pub fn set_current_balance(&mut self, balance: f64) {
        self.current_balance = Some(balance);
    }

    pub fn trades(&self) -> &[TrackedTrade] {
        &self.trades
    }

    /// `None` until the first fill.
    ///
    /// P&L is sell value minus buy value, and only once both sides have
    /// traded; an open position contributes nothing.
    pub fn performance(&self, now: DateTime<Utc>) -> Option<TrackerPerformance> {
        if self.trades.is_empty() {
            return None;
        }
        let total_trades = self.trades.len();
        let buys = self.trades.iter().filter(|t| t.side == TradeSide::Buy);
        let sells = self.trades.iter().filter(|t| t.side == TradeSide::Sell);
        let buy_trades = buys.clone().count();
        let sell_trades = sells.clone().count();
        let total_buy_value: f64 = buys.map(|t| t.value).sum();
        let total_sell_value: f64 = sells.map(|t| t.value).sum();

        let (pnl, pnl_pct) = if total_buy_value > 0.0 && total_sell_value > 0.0 {
            let pnl = total_sell_value - total_buy_value;
            (pnl, pnl / total_buy_value * 100.0)
        } else {
            (0.0, 0.0)
        };

        let trading_hours = (now - self.started_at).num_seconds() as f64 / 3600.0;
        let trades_per_hour = if trading_hours > 0.0 {
            total_trades as f64 / trading_hours
        } else {
            0.0
        };

        Some(TrackerPerformance {
            total_trades,
            buy_trades,
            sell_trades,
            total_buy_value,
            total_sell_value,
            pnl,
            pnl_pct,
            avg_trade_value: (total_buy_value + total_sell_value) / total_trades as f64,
            trading_hours,
            trades_per_hour,
            initial_balance: self.initial_balance,
            current_balance: self.current_balance,
        })
    }
}

// ─── Session ────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("market data: {0}")]
    Data(#[from] DataError),
    #[error("order sink: {0}")]
    Sink(#[from] SinkError),
}

/// What one step did.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// Trading is switched off for this session.
    Disabled,
    /// Nothing to do this step.
    Held,
    Opened(Fill),
    Closed { fill: Fill, reason: ExitReason },
    /// A BUY signal that could not be sized.
    Skipped { reason: String },
}

/// Explicit state of one live strategy.
#[derive(Debug, Clone)]
pub struct TradingSession {
    strategy: Strategy,
    symbol: String,
    timeframe: Timeframe,
    /// Fraction of the free balance committed per entry.
    position_ratio: f64,
    history: usize,
    enabled: bool,
    position: Option<Position>,
    tracker: TradeTracker,
}

impl TradingSession {
    pub fn new(
        strategy: Strategy,
        symbol: impl Into<String>,
        timeframe: Timeframe,
        position_ratio: f64,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            strategy,
            symbol: symbol.into(),
            timeframe,
            position_ratio,
            history: DEFAULT_HISTORY,
            enabled: true,
            position: None,
            tracker: TradeTracker::new(started_at),
        }
    }

    pub fn with_history(mut self, candles: usize) -> Self {
        self.history = candles;
        self
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    pub fn tracker(&self) -> &TradeTracker {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut TradeTracker {
        &mut self.tracker
    }

    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    /// Run one decision cycle at wall-clock time `now`.
    pub fn step(
        &mut self,
        source: &dyn MarketDataSource,
        sink: &dyn OrderSink,
        now: DateTime<Utc>,
    ) -> Result<StepOutcome, SessionError> {
        if !self.enabled {
            return Ok(StepOutcome::Disabled);
        }

        let candles = source.fetch_series(&self.symbol, self.timeframe, self.history)?;
        let Some(last) = candles.last() else {
            warn!(symbol = %self.symbol, "no candles returned");
            return Ok(StepOutcome::Held);
        };
        let close = last.close;

        if let Some(position) = &self.position {
            if let Some(reason) = RiskManager.check(position, close, now) {
                return self.close_position(sink, reason, now);
            }
        }

        let decision = self
            .strategy
            .evaluate(&candles, candles.len() - 1, self.position.is_some());
        match (decision.action, self.position.is_some()) {
            (Action::Buy, false) => self.open_position(sink, close, now),
            (Action::Sell, true) => {
                let reason = decision.exit_reason.unwrap_or(ExitReason::Signal);
                self.close_position(sink, reason, now)
            }
            _ => Ok(StepOutcome::Held),
        }
    }

    fn open_position(
        &mut self,
        sink: &dyn OrderSink,
        price: f64,
        now: DateTime<Utc>,
    ) -> Result<StepOutcome, SessionError> {
        let available = sink.available_balance()?;
        self.tracker.set_current_balance(available);
        let Some(quantity) = order_quantity(available, self.position_ratio, price) else {
            let reason = format!(
                "order below minimum notional ${MIN_ORDER_NOTIONAL:.0} (free balance ${available:.2})"
            );
            debug!(symbol = %self.symbol, %reason, "buy skipped");
            return Ok(StepOutcome::Skipped { reason });
        };

        let fill = sink.submit(TradeSide::Buy, &self.symbol, quantity)?;
        self.tracker.record(now, TradeSide::Buy, &self.symbol, &fill);

        let limits = self.strategy.risk_limits();
        let value = fill.quantity * fill.price;
        self.position = Some(Position {
            symbol: self.symbol.clone(),
            entry_price: fill.price,
            entry_time: now,
            quantity: fill.quantity,
            value,
            margin: value,
            entry_commission: 0.0,
            stop_loss_price: fill.price * (1.0 + limits.stop_loss),
            take_profit_price: fill.price * (1.0 + limits.take_profit),
            max_hold_until: limits.deadline_from(now),
        });
        Ok(StepOutcome::Opened(fill))
    }

    fn close_position(
        &mut self,
        sink: &dyn OrderSink,
        reason: ExitReason,
        now: DateTime<Utc>,
    ) -> Result<StepOutcome, SessionError> {
        let Some(position) = &self.position else {
            return Ok(StepOutcome::Held);
        };
        let fill = sink.submit(TradeSide::Sell, &self.symbol, position.quantity)?;
        self.tracker.record(now, TradeSide::Sell, &self.symbol, &fill);
        self.position = None;
        info!(symbol = %self.symbol, %reason, "position closed");
        Ok(StepOutcome::Closed { fill, reason })
    }
}

/// Size a market buy: `available × ratio / price`, floored to the exchange
/// minimum quantity. `None` when the notional is below [`MIN_ORDER_NOTIONAL`].
pub fn order_quantity(available: f64, ratio: f64, price: f64) -> Option<f64> {
    let notional = available * ratio;
    if notional.is_nan() || notional < MIN_ORDER_NOTIONAL || price <= 0.0 {
        return None;
    }
    Some((notional / price).max(MIN_ORDER_QUANTITY))
}
