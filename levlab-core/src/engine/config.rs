//! Engine configuration: account size and trading frictions.

use serde::{Deserialize, Serialize};

use crate::strategy::ParamError;

/// Configuration for a single backtest run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub initial_balance: f64,
    /// Fraction of the current balance committed per entry.
    pub balance_ratio: f64,
    pub leverage: f64,
    /// Charged on notional at entry and exit.
    pub commission_rate: f64,
    /// Buys fill above the close, sells below it.
    pub slippage_rate: f64,
    /// Entries smaller than this are floored up to it.
    pub min_quantity: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            initial_balance: 10_000.0,
            balance_ratio: 0.3,
            leverage: 1.0,
            commission_rate: 0.0004,
            slippage_rate: 0.0002,
            min_quantity: 0.001,
        }
    }
}

impl EngineConfig {
    /// Frictionless variant, handy for checking arithmetic by hand.
    pub fn frictionless() -> Self {
        Self {
            commission_rate: 0.0,
            slippage_rate: 0.0,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ParamError> {
        let checks: [(&str, f64, bool, &str); 6] = [
            (
                "initial_balance",
                self.initial_balance,
                self.initial_balance > 0.0,
                "must be > 0",
            ),
            (
                "balance_ratio",
                self.balance_ratio,
                self.balance_ratio > 0.0 && self.balance_ratio <= 1.0,
                "must be in (0, 1]",
            ),
            ("leverage", self.leverage, self.leverage >= 1.0, "must be >= 1"),
            (
                "commission_rate",
                self.commission_rate,
                (0.0..1.0).contains(&self.commission_rate),
                "must be in [0, 1)",
            ),
            (
                "slippage_rate",
                self.slippage_rate,
                (0.0..1.0).contains(&self.slippage_rate),
                "must be in [0, 1)",
            ),
            (
                "min_quantity",
                self.min_quantity,
                self.min_quantity >= 0.0,
                "must be >= 0",
            ),
        ];

        for (name, value, ok, reason) in checks {
            if !value.is_finite() {
                return Err(ParamError::NonFinite {
                    name: name.to_string(),
                    value,
                });
            }
            if !ok {
                return Err(ParamError::out_of_range(name, value, reason));
            }
        }
        Ok(())
    }

    pub fn buy_fill(&self, close: f64) -> f64 {
        close * (1.0 + self.slippage_rate)
    }

    pub fn sell_fill(&self, close: f64) -> f64 {
        close * (1.0 - self.slippage_rate)
    }
}
