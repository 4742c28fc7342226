//! Backtest execution engine — candle-by-candle position state machine.
//!
//! The engine holds at most one long position per run (FLAT ⇄ LONG), enforces
//! stop-loss, take-profit and max holding time before consulting the strategy,
//! and charges commission and slippage on every fill. It is single-threaded and
//! owns no shared state, so the optimizer can run many engines side by side.

pub mod config;
pub mod loop_runner;
pub mod risk;
pub mod state;

pub use config::EngineConfig;
pub use loop_runner::run_backtest;
pub use risk::RiskManager;
pub use state::{EngineState, RunResult};
