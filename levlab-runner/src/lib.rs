//! LevLab Runner — backtest orchestration, scorecards, optimizer, result store.
//!
//! This crate builds on `levlab-core` to provide:
//! - Performance scorecards computed from engine runs
//! - Single-backtest runner with parameter validation
//! - Seeded, parallel grid-search optimizer with a relaxed retry pass
//! - Optimization result store with staleness-aware loading
//! - TOML configuration and a CSV candle source
//! - Live trading session with an order sink seam and trade tracker
//! - Per-symbol portfolio selection and CSV/JSON/Markdown export

pub mod config;
pub mod data_loader;
pub mod export;
pub mod metrics;
pub mod optimizer;
pub mod portfolio;
pub mod runner;
pub mod session;
pub mod store;

pub use config::{ConfigError, LevlabConfig};
pub use data_loader::CsvSource;
pub use metrics::Scorecard;
pub use optimizer::{
    Candidate, OptimizationOutcome, OptimizeError, Optimizer, OptimizerConfig, ParamRanges,
    RelaxPolicy,
};
pub use portfolio::{select_portfolio, PortfolioEntry};
pub use runner::{run_backtest, BacktestResult, RunError};
pub use session::{
    Fill, OrderSink, SessionError, SinkError, StepOutcome, TradeTracker, TradingSession,
};
pub use store::{
    load_latest, JsonFileStore, MemoryStore, OptimizationRecord, OptimizationStore, StoreError,
    StoreKey,
};
