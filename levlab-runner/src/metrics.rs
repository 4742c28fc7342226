//! Performance metrics as pure functions over a run.
//!
//! Every metric is a pure function: trade ledger and/or equity curve in, scalar
//! out. No dependencies on the optimizer, the store or any data source.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use levlab_core::domain::{EquityPoint, TradeRecord};
use levlab_core::engine::RunResult;

/// Summary statistics for a single backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scorecard {
    pub total_trades: usize,
    pub buy_trades: usize,
    pub sell_trades: usize,
    /// Fraction in [0, 1]; final-liquidation closes are excluded.
    pub win_rate: f64,
    /// May be `+inf`; serialized as the string `"inf"`.
    #[serde(with = "float_label")]
    pub profit_factor: f64,
    pub total_return: f64,
    pub total_return_pct: f64,
    /// Fraction of the running peak, >= 0.
    pub max_drawdown: f64,
    pub total_pnl: f64,
    pub total_commission: f64,
    pub initial_balance: f64,
    pub final_balance: f64,
    pub period_start: Option<DateTime<Utc>>,
    pub period_end: Option<DateTime<Utc>>,
}

impl Scorecard {
    /// Compute every metric from one engine run.
    pub fn compute(result: &RunResult) -> Self {
        let trades = &result.trades;
        let (period_start, period_end) = match result.period() {
            Some((start, end)) => (Some(start), Some(end)),
            None => (None, None),
        };
        let total_return = result.final_balance - result.initial_balance;
        Self {
            total_trades: trades.len(),
            buy_trades: trades.iter().filter(|t| t.is_open()).count(),
            sell_trades: trades.iter().filter(|t| t.is_close()).count(),
            win_rate: win_rate(trades),
            profit_factor: profit_factor(trades),
            total_return,
            total_return_pct: total_return_pct(result.initial_balance, result.final_balance),
            max_drawdown: max_drawdown(&result.equity_curve, result.initial_balance),
            total_pnl: total_pnl(trades),
            total_commission: total_commission(trades),
            initial_balance: result.initial_balance,
            final_balance: result.final_balance,
            period_start,
            period_end,
        }
    }

    pub fn is_profitable(&self) -> bool {
        self.total_return > 0.0
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Fraction of closes with positive P&L.
///
/// Final-liquidation closes are forced by the end of data rather than by the
/// strategy, so they count in neither numerator nor denominator.
pub fn win_rate(trades: &[TradeRecord]) -> f64 {
    let closes: Vec<&TradeRecord> = trades
        .iter()
        .filter(|t| t.is_close() && !t.is_final_liquidation())
        .collect();
    if closes.is_empty() {
        return 0.0;
    }
    let winners = closes.iter().filter(|t| t.is_winner()).count();
    winners as f64 / closes.len() as f64
}

/// Gross profit / gross loss over all closes.
///
/// Returns `f64::INFINITY` when there are winners and no losers, 0.0 when
/// there are no closes or no winners.
pub fn profit_factor(trades: &[TradeRecord]) -> f64 {
    let pnls: Vec<f64> = trades.iter().filter_map(|t| t.pnl).collect();
    let gross_profit: f64 = pnls.iter().filter(|&&p| p > 0.0).sum();
    let gross_loss: f64 = pnls.iter().filter(|&&p| p < 0.0).map(|p| p.abs()).sum();

    if gross_profit <= 0.0 {
        return 0.0;
    }
    if gross_loss < 1e-15 {
        return f64::INFINITY;
    }
    gross_profit / gross_loss
}

/// Percentage change of the account balance over the run.
pub fn total_return_pct(initial_balance: f64, final_balance: f64) -> f64 {
    if initial_balance <= 0.0 {
        return 0.0;
    }
    (final_balance - initial_balance) / initial_balance * 100.0
}

/// Largest fractional decline from a running equity peak.
///
/// The peak starts at the initial balance, so a run that loses from the very
/// first candle still reports its drawdown.
pub fn max_drawdown(equity_curve: &[EquityPoint], initial_balance: f64) -> f64 {
    let mut peak = initial_balance;
    let mut worst = 0.0_f64;
    for point in equity_curve {
        if point.equity > peak {
            peak = point.equity;
        }
        if peak > 0.0 {
            let dd = (peak - point.equity) / peak;
            if dd > worst {
                worst = dd;
            }
        }
    }
    worst
}

/// Sum of realized P&L over all closes.
pub fn total_pnl(trades: &[TradeRecord]) -> f64 {
    trades.iter().filter_map(|t| t.pnl).sum()
}

/// Sum of commissions paid on opens and closes.
pub fn total_commission(trades: &[TradeRecord]) -> f64 {
    trades.iter().map(|t| t.commission).sum()
}

// ─── Serde helper ───────────────────────────────────────────────────

/// Writes non-finite floats as `"inf"`, `"-inf"` or `"nan"` so they survive
/// a JSON round trip; finite values stay plain numbers.
pub mod float_label {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Label(String),
    }

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else if value.is_nan() {
            serializer.serialize_str("nan")
        } else if *value > 0.0 {
            serializer.serialize_str("inf")
        } else {
            serializer.serialize_str("-inf")
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Number(v) => Ok(v),
            Repr::Label(s) => match s.as_str() {
                "inf" | "+inf" | "infinity" => Ok(f64::INFINITY),
                "-inf" | "-infinity" => Ok(f64::NEG_INFINITY),
                "nan" => Ok(f64::NAN),
                other => Err(serde::de::Error::custom(format!(
                    "expected a number or inf/-inf/nan, got '{other}'"
                ))),
            },
        }
    }
}
