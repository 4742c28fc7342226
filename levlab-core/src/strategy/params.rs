//! Strategy parameter maps and their validation.
//!
//! Parameters travel as an ordered name → value map so they can be merged,
//! fingerprinted, persisted and swept generically. Each strategy then parses
//! the map into a typed struct exactly once, before any backtest runs.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::TimeframeParseError;

/// Largest accepted indicator period.
pub const MAX_PERIOD: usize = 10_000;

/// Largest accepted holding time: one hundred years.
pub const MAX_HOLD_HOURS: f64 = 24.0 * 365.0 * 100.0;

// ─── Error type ──────────────────────────────────────────────────────

/// Invalid parameter or configuration value, raised before any run starts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParamError {
    #[error("unknown parameter '{name}' for strategy '{strategy}'")]
    Unknown { strategy: String, name: String },

    #[error("parameter '{name}' must be finite, got {value}")]
    NonFinite { name: String, value: f64 },

    #[error("parameter '{name}' must be a whole number >= 1, got {value}")]
    NotAPeriod { name: String, value: f64 },

    #[error("parameter '{name}' = {value} is out of range: {reason}")]
    OutOfRange {
        name: String,
        value: f64,
        reason: String,
    },

    #[error("unknown strategy '{0}' (expected 'ma' or 'rsi')")]
    UnknownStrategy(String),

    #[error(transparent)]
    Timeframe(#[from] TimeframeParseError),

    #[error("{0}")]
    Invalid(String),
}

impl ParamError {
    pub fn out_of_range(name: &str, value: f64, reason: impl Into<String>) -> Self {
        Self::OutOfRange {
            name: name.to_string(),
            value,
            reason: reason.into(),
        }
    }
}

// ─── Parameter map ───────────────────────────────────────────────────

/// Immutable ordered map of strategy parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StrategyParams(BTreeMap<String, f64>);

impl StrategyParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        Self(pairs.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Builder-style insert, returning the extended map.
    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.0.insert(name.into(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// `self` with every entry of `overrides` layered on top.
    pub fn merged(&self, overrides: &StrategyParams) -> StrategyParams {
        let mut out = self.0.clone();
        for (k, v) in &overrides.0 {
            out.insert(k.clone(), *v);
        }
        Self(out)
    }

    /// Canonical JSON (keys sorted by the BTreeMap), used for fingerprints.
    pub fn canonical_json(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_default()
    }

    /// Look up a finite value. Missing names are an internal inconsistency
    /// because callers merge defaults first.
    pub(crate) fn require(&self, name: &str) -> Result<f64, ParamError> {
        let value = self
            .get(name)
            .ok_or_else(|| ParamError::Invalid(format!("missing parameter '{name}'")))?;
        if !value.is_finite() {
            return Err(ParamError::NonFinite {
                name: name.to_string(),
                value,
            });
        }
        Ok(value)
    }

    pub(crate) fn require_period(&self, name: &str) -> Result<usize, ParamError> {
        let value = self.require(name)?;
        if value < 1.0 || value.fract() != 0.0 {
            return Err(ParamError::NotAPeriod {
                name: name.to_string(),
                value,
            });
        }
        if value > MAX_PERIOD as f64 {
            return Err(ParamError::out_of_range(
                name,
                value,
                format!("must be <= {MAX_PERIOD}"),
            ));
        }
        Ok(value as usize)
    }

    /// Reject names outside `allowed`.
    pub(crate) fn check_names(&self, strategy: &str, allowed: &[&str]) -> Result<(), ParamError> {
        match self.0.keys().find(|k| !allowed.contains(&k.as_str())) {
            Some(name) => Err(ParamError::Unknown {
                strategy: strategy.to_string(),
                name: name.clone(),
            }),
            None => Ok(()),
        }
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for StrategyParams {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        Self::from_pairs(iter)
    }
}

// ─── Risk limits ─────────────────────────────────────────────────────

/// Per-position exit thresholds shared by every strategy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskLimits {
    /// Negative fraction, e.g. -0.02 closes 2% below entry.
    pub stop_loss: f64,
    /// Positive fraction above entry.
    pub take_profit: f64,
    pub max_hold_hours: f64,
}

impl RiskLimits {
    pub(crate) fn from_params(params: &StrategyParams) -> Result<Self, ParamError> {
        let stop_loss = params.require("stop_loss")?;
        if stop_loss >= 0.0 || stop_loss <= -1.0 {
            return Err(ParamError::out_of_range(
                "stop_loss",
                stop_loss,
                "must be in (-1, 0)",
            ));
        }
        let take_profit = params.require("take_profit")?;
        if take_profit <= 0.0 {
            return Err(ParamError::out_of_range(
                "take_profit",
                take_profit,
                "must be > 0",
            ));
        }
        let max_hold_hours = params.require("max_hold_hours")?;
        if max_hold_hours <= 0.0 || max_hold_hours > MAX_HOLD_HOURS {
            return Err(ParamError::out_of_range(
                "max_hold_hours",
                max_hold_hours,
                format!("must be in (0, {MAX_HOLD_HOURS}]"),
            ));
        }
        Ok(Self {
            stop_loss,
            take_profit,
            max_hold_hours,
        })
    }

    pub fn max_hold(&self) -> Duration {
        let hours = self.max_hold_hours.clamp(0.0, MAX_HOLD_HOURS);
        Duration::seconds((hours * 3600.0).round() as i64)
    }

    /// Forced-exit time for a position opened at `entry`. Saturates at the
    /// latest representable instant instead of overflowing.
    pub fn deadline_from(&self, entry: DateTime<Utc>) -> DateTime<Utc> {
        entry
            .checked_add_signed(self.max_hold())
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    pub(crate) fn write_into(&self, params: StrategyParams) -> StrategyParams {
        params
            .with("stop_loss", self.stop_loss)
            .with("take_profit", self.take_profit)
            .with("max_hold_hours", self.max_hold_hours)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_overrides_defaults() {
        let defaults = StrategyParams::new().with("a", 1.0).with("b", 2.0);
        let overrides = StrategyParams::new().with("b", 5.0);
        let merged = defaults.merged(&overrides);
        assert_eq!(merged.get("a"), Some(1.0));
        assert_eq!(merged.get("b"), Some(5.0));
        // Inputs untouched
        assert_eq!(defaults.get("b"), Some(2.0));
    }

    #[test]
    fn canonical_json_is_order_independent() {
        let a = StrategyParams::from_pairs([("z", 1.0), ("a", 2.0)]);
        let b = StrategyParams::from_pairs([("a", 2.0), ("z", 1.0)]);
        assert_eq!(a.canonical_json(), b.canonical_json());
        assert_eq!(a.canonical_json(), r#"{"a":2.0,"z":1.0}"#);
    }

    #[test]
    fn period_must_be_whole_and_positive() {
        let p = StrategyParams::new()
            .with("ok", 5.0)
            .with("zero", 0.0)
            .with("frac", 2.5)
            .with("nan", f64::NAN);
        assert_eq!(p.require_period("ok").unwrap(), 5);
        assert!(matches!(
            p.require_period("zero"),
            Err(ParamError::NotAPeriod { .. })
        ));
        assert!(matches!(
            p.require_period("frac"),
            Err(ParamError::NotAPeriod { .. })
        ));
        assert!(matches!(
            p.require_period("nan"),
            Err(ParamError::NonFinite { .. })
        ));
    }

    #[test]
    fn unknown_names_rejected() {
        let p = StrategyParams::new().with("short_period", 5.0).with("bogus", 1.0);
        let err = p.check_names("ma", &["short_period"]).unwrap_err();
        assert_eq!(
            err,
            ParamError::Unknown {
                strategy: "ma".into(),
                name: "bogus".into()
            }
        );
    }

    #[test]
    fn risk_limits_validation() {
        let base = StrategyParams::new()
            .with("stop_loss", -0.02)
            .with("take_profit", 0.03)
            .with("max_hold_hours", 24.0);
        let limits = RiskLimits::from_params(&base).unwrap();
        assert_eq!(limits.max_hold(), Duration::hours(24));

        assert!(RiskLimits::from_params(&base.clone().with("stop_loss", 0.01)).is_err());
        assert!(RiskLimits::from_params(&base.clone().with("stop_loss", -1.0)).is_err());
        assert!(RiskLimits::from_params(&base.clone().with("take_profit", 0.0)).is_err());
        assert!(RiskLimits::from_params(&base.with("max_hold_hours", 0.0)).is_err());
    }

    #[test]
    fn huge_max_hold_rejected() {
        let base = StrategyParams::new()
            .with("stop_loss", -0.02)
            .with("take_profit", 0.03);
        for hours in [1e10, 1e13, MAX_HOLD_HOURS + 1.0] {
            let err = RiskLimits::from_params(&base.clone().with("max_hold_hours", hours)).unwrap_err();
            assert!(matches!(err, ParamError::OutOfRange { .. }), "{hours}: {err}");
        }
        let limits = RiskLimits::from_params(&base.with("max_hold_hours", MAX_HOLD_HOURS)).unwrap();
        assert_eq!(limits.max_hold(), Duration::hours(MAX_HOLD_HOURS as i64));
    }

    #[test]
    fn deadline_saturates_instead_of_overflowing() {
        let limits = RiskLimits {
            stop_loss: -0.02,
            take_profit: 0.03,
            max_hold_hours: 1e13,
        };
        let entry = DateTime::<Utc>::MAX_UTC - Duration::hours(1);
        assert_eq!(limits.deadline_from(entry), DateTime::<Utc>::MAX_UTC);

        let normal = RiskLimits {
            max_hold_hours: 2.0,
            ..limits
        };
        let start = DateTime::<Utc>::UNIX_EPOCH;
        assert_eq!(normal.deadline_from(start), start + Duration::hours(2));
    }

    #[test]
    fn oversized_period_rejected() {
        let p = StrategyParams::new()
            .with("cap", MAX_PERIOD as f64)
            .with("huge", 1e20);
        assert_eq!(p.require_period("cap").unwrap(), MAX_PERIOD);
        assert!(matches!(
            p.require_period("huge"),
            Err(ParamError::OutOfRange { .. })
        ));
    }

    #[test]
    fn serde_is_a_plain_map() {
        let p = StrategyParams::new().with("rsi_buy", 30.0);
        let json = serde_json::to_string(&p).unwrap();
        assert_eq!(json, r#"{"rsi_buy":30.0}"#);
        let back: StrategyParams = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
    }
}
