use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-candle account snapshot.
///
/// `equity == balance + position_value` by construction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub equity: f64,
    pub balance: f64,
    pub position_value: f64,
}
