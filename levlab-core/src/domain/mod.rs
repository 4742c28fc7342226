//! Domain types for LevLab

pub mod candle;
pub mod equity;
pub mod position;
pub mod timeframe;
pub mod trade;

pub use candle::{canonicalize, is_strictly_increasing, Candle};
pub use equity::EquityPoint;
pub use position::Position;
pub use timeframe::{Timeframe, TimeframeParseError};
pub use trade::{ExitReason, TradeRecord, TradeSide};

/// Symbol type alias
pub type Symbol = String;
