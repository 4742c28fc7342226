//! Market data access

pub mod provider;

pub use provider::{take_latest, DataError, MarketDataSource, StaticSource};
