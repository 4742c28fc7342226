//! LevLab Core — domain types, indicators, strategies, and the backtest engine.
//!
//! This crate contains the heart of the backtester:
//! - Domain types (candles, timeframes, positions, trade records, equity points)
//! - Indicator library (SMA, EMA, RSI, MACD, Stochastic, pivots, volume ratio)
//! - Strategy signal generators behind one `SignalGenerator` trait
//! - Candle-by-candle engine with commission, slippage and leverage
//! - The `MarketDataSource` seam for candle retrieval

pub mod data;
pub mod domain;
pub mod engine;
pub mod indicators;
pub mod strategy;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: core types are Send + Sync so the optimizer can
    /// fan runs out across rayon workers.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        // Domain types
        require_send::<domain::Candle>();
        require_sync::<domain::Candle>();
        require_send::<domain::Timeframe>();
        require_sync::<domain::Timeframe>();
        require_send::<domain::Position>();
        require_sync::<domain::Position>();
        require_send::<domain::TradeRecord>();
        require_sync::<domain::TradeRecord>();
        require_send::<domain::EquityPoint>();
        require_sync::<domain::EquityPoint>();

        // Strategy types
        require_send::<strategy::Strategy>();
        require_sync::<strategy::Strategy>();
        require_send::<strategy::StrategyParams>();
        require_sync::<strategy::StrategyParams>();
        require_send::<strategy::Decision>();
        require_sync::<strategy::Decision>();

        // Engine types
        require_send::<engine::EngineConfig>();
        require_sync::<engine::EngineConfig>();
        require_send::<engine::EngineState>();
        require_sync::<engine::EngineState>();
        require_send::<engine::RunResult>();
        require_sync::<engine::RunResult>();

        // Data
        require_send::<data::StaticSource>();
        require_sync::<data::StaticSource>();
        require_send::<data::DataError>();
        require_sync::<data::DataError>();
    }

    /// Architecture contract: SignalGenerator sees candles and a has-position
    /// flag, never balances or the position itself.
    #[test]
    fn signal_generator_has_no_account_parameter() {
        fn _check_trait_object_builds(
            sig: &dyn strategy::SignalGenerator,
            candles: &[domain::Candle],
        ) -> strategy::Decision {
            sig.evaluate(candles, 0, false)
        }
    }
}
