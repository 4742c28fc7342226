//! Strategy optimizer — bounded grid search over a strategy's parameters.
//!
//! The full Cartesian product of a strategy's [`ParamRanges`] is expanded in
//! declared order, invalid combinations are dropped, and the remainder is
//! uniformly subsampled (seeded, so repeatable) when it exceeds the caller's
//! budget. Each surviving combination runs on a fresh engine; the best by
//! total return is persisted through an [`OptimizationStore`].
//!
//! If no combination makes money and the relax policy allows it, a second
//! pass runs over wider "relaxed" ranges and the outcome is tagged as such.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Instant;

use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use levlab_core::data::MarketDataSource;
use levlab_core::domain::{Candle, Timeframe};
use levlab_core::engine::EngineConfig;
use levlab_core::strategy::{ParamError, Strategy, StrategyKind, StrategyParams};

use crate::metrics::Scorecard;
use crate::runner::{run_prepared, SCHEMA_VERSION};
use crate::store::{OptimizationRecord, OptimizationStore, StoreError, StoreKey};

/// Fewer candles than this and the optimizer refuses to run.
pub const MIN_OPTIMIZATION_CANDLES: usize = 100;

pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_MAX_COMBINATIONS: usize = 50;
pub const DEFAULT_LOOKBACK_DAYS: u32 = 7;

/// Errors from an optimization run.
#[derive(Debug, Error)]
pub enum OptimizeError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(#[from] ParamError),
    #[error("data unavailable for {symbol}: {reason}")]
    DataUnavailable { symbol: String, reason: String },
    #[error("optimization cancelled")]
    Cancelled,
    #[error("no valid parameter combination for '{0}'")]
    NoCandidates(StrategyKind),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

// ─── Parameter ranges ───────────────────────────────────────────────

/// Ordered list of `(parameter, candidate values)`.
///
/// Order is significant: it fixes the order of the Cartesian product and
/// therefore which combination wins a tie.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamRanges {
    ranges: Vec<(String, Vec<f64>)>,
}

impl ParamRanges {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a parameter. Later parameters vary fastest in the product.
    pub fn with(mut self, name: impl Into<String>, values: impl Into<Vec<f64>>) -> Self {
        self.ranges.push((name.into(), values.into()));
        self
    }

    /// Default search space for `kind`.
    pub fn normal(kind: StrategyKind) -> Self {
        match kind {
            StrategyKind::Ma => Self::new()
                .with("short_period", [5.0, 7.0, 10.0])
                .with("long_period", [15.0, 20.0, 25.0])
                .with("stop_loss", [-0.015, -0.02])
                .with("take_profit", [0.03, 0.04])
                .with("max_hold_hours", [24.0]),
            StrategyKind::Rsi => Self::new()
                .with("rsi_buy", [28.0, 30.0, 32.0])
                .with("rsi_sell", [68.0, 70.0, 72.0])
                .with("stop_loss", [-0.015, -0.02])
                .with("take_profit", [0.03, 0.04])
                .with("support_distance", [0.02, 0.03]),
        }
    }

    /// Wider search space used when the normal one finds nothing profitable.
    pub fn relaxed(kind: StrategyKind) -> Self {
        match kind {
            StrategyKind::Ma => Self::new()
                .with("short_period", [3.0, 5.0, 7.0])
                .with("long_period", [10.0, 15.0, 20.0])
                .with("stop_loss", [-0.025, -0.03])
                .with("take_profit", [0.02, 0.025])
                .with("max_hold_hours", [12.0, 18.0]),
            StrategyKind::Rsi => Self::new()
                .with("rsi_buy", [25.0, 28.0, 30.0])
                .with("rsi_sell", [70.0, 72.0, 75.0])
                .with("stop_loss", [-0.025, -0.03])
                .with("take_profit", [0.02, 0.025])
                .with("support_distance", [0.025, 0.03]),
        }
    }

    pub fn for_pass(kind: StrategyKind, relaxed: bool) -> Self {
        if relaxed {
            Self::relaxed(kind)
        } else {
            Self::normal(kind)
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.ranges.iter().map(|(name, _)| name.as_str())
    }

    /// Size of the full Cartesian product (0 if any list is empty).
    pub fn combination_count(&self) -> usize {
        if self.ranges.is_empty() {
            return 0;
        }
        self.ranges.iter().map(|(_, values)| values.len()).product()
    }

    /// Every combination, first parameter slowest, last parameter fastest.
    pub fn combinations(&self) -> Vec<StrategyParams> {
        let total = self.combination_count();
        let mut out = Vec::with_capacity(total);
        for mut n in 0..total {
            let mut values = vec![0.0; self.ranges.len()];
            for (slot, (_, candidates)) in self.ranges.iter().enumerate().rev() {
                values[slot] = candidates[n % candidates.len()];
                n /= candidates.len();
            }
            out.push(
                self.ranges
                    .iter()
                    .zip(values)
                    .map(|((name, _), v)| (name.clone(), v))
                    .collect(),
            );
        }
        out
    }
}

// ─── Configuration ──────────────────────────────────────────────────

/// Whether an unprofitable search may retry over the relaxed ranges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelaxPolicy {
    #[default]
    Automatic,
    Disabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    pub engine: EngineConfig,
    /// Seed for combination subsampling.
    pub seed: u64,
    /// Evaluate combinations on the rayon pool.
    pub parallel: bool,
    pub relax_policy: RelaxPolicy,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            seed: DEFAULT_SEED,
            parallel: true,
            relax_policy: RelaxPolicy::Automatic,
        }
    }
}

// ─── Results ────────────────────────────────────────────────────────

/// One evaluated parameter combination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub params: StrategyParams,
    pub scorecard: Scorecard,
    /// BLAKE3 of the parameters' canonical JSON.
    pub fingerprint: String,
}

impl Candidate {
    pub fn new(params: StrategyParams, scorecard: Scorecard) -> Self {
        let fingerprint = fingerprint(&params);
        Self {
            params,
            scorecard,
            fingerprint,
        }
    }
}

/// Content hash of a parameter set; identical maps give identical hashes.
pub fn fingerprint(params: &StrategyParams) -> String {
    let json = params.canonical_json();
    let hash = blake3::hash(json.as_bytes());
    format!("{}", hash.to_hex())
}

/// Everything one `optimize` call produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationOutcome {
    pub strategy: StrategyKind,
    pub symbol: String,
    pub timeframe: Timeframe,
    /// True when the result came from the relaxed ranges.
    pub relaxed: bool,
    pub best_params: StrategyParams,
    pub best: Scorecard,
    /// Evaluated combinations of the pass that produced `best`, in product order.
    pub candidates: Vec<Candidate>,
    pub record: OptimizationRecord,
}

impl OptimizationOutcome {
    /// The `n` highest-returning candidates, ties kept in product order.
    pub fn top(&self, n: usize) -> Vec<&Candidate> {
        let mut ranked: Vec<&Candidate> = self.candidates.iter().collect();
        ranked.sort_by(|a, b| {
            b.scorecard
                .total_return
                .partial_cmp(&a.scorecard.total_return)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        ranked.truncate(n);
        ranked
    }
}

// ─── Combination selection ──────────────────────────────────────────

/// Expand `ranges` over the strategy defaults, drop combinations that fail
/// validation and subsample down to `max_combinations`.
///
/// Sampling is uniform without replacement, seeded by `seed`; the chosen
/// combinations keep their product order.
pub fn select_combinations(
    kind: StrategyKind,
    ranges: &ParamRanges,
    max_combinations: usize,
    seed: u64,
) -> Vec<Strategy> {
    let valid: Vec<Strategy> = ranges
        .combinations()
        .into_iter()
        .filter_map(|combo| match Strategy::build(kind, &combo) {
            Ok(strategy) => Some(strategy),
            Err(e) => {
                debug!(strategy = %kind, error = %e, "skipping invalid combination");
                None
            }
        })
        .collect();

    if valid.len() <= max_combinations {
        return valid;
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut picked = rand::seq::index::sample(&mut rng, valid.len(), max_combinations).into_vec();
    picked.sort_unstable();

    let mut keep = vec![false; valid.len()];
    for i in picked {
        keep[i] = true;
    }
    valid
        .into_iter()
        .zip(keep)
        .filter_map(|(strategy, kept)| kept.then_some(strategy))
        .collect()
}

/// First candidate with the strictly highest total return.
pub fn best_candidate(candidates: &[Candidate]) -> Option<&Candidate> {
    let mut best: Option<&Candidate> = None;
    for c in candidates {
        if best.map_or(true, |b| c.scorecard.total_return > b.scorecard.total_return) {
            best = Some(c);
        }
    }
    best
}

// ─── Optimizer ──────────────────────────────────────────────────────

/// Progress callback: `(completed, total)` for the current pass.
pub type ProgressFn<'a> = &'a (dyn Fn(usize, usize) + Send + Sync);

/// Grid-search optimizer over one data source and one result store.
pub struct Optimizer<'a> {
    source: &'a dyn MarketDataSource,
    store: &'a dyn OptimizationStore,
    config: OptimizerConfig,
    cancel: Option<&'a AtomicBool>,
    progress: Option<ProgressFn<'a>>,
}

impl<'a> Optimizer<'a> {
    pub fn new(
        source: &'a dyn MarketDataSource,
        store: &'a dyn OptimizationStore,
        config: OptimizerConfig,
    ) -> Self {
        Self {
            source,
            store,
            config,
            cancel: None,
            progress: None,
        }
    }

    /// Cooperative cancellation, checked before every combination.
    pub fn with_cancel(mut self, cancel: &'a AtomicBool) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn with_progress(mut self, progress: ProgressFn<'a>) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    pub fn store(&self) -> &dyn OptimizationStore {
        self.store
    }

    /// Search `kind`'s parameter space on the latest `lookback_days` of data
    /// and persist the best combination.
    pub fn optimize(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        kind: StrategyKind,
        lookback_days: u32,
        max_combinations: usize,
    ) -> Result<OptimizationOutcome, OptimizeError> {
        if max_combinations < 1 {
            return Err(ParamError::out_of_range(
                "max_combinations",
                max_combinations as f64,
                "must be >= 1",
            )
            .into());
        }
        if lookback_days < 1 {
            return Err(ParamError::out_of_range(
                "lookback_days",
                f64::from(lookback_days),
                "must be >= 1",
            )
            .into());
        }
        self.config.engine.validate()?;

        let series = self.fetch(symbol, timeframe, lookback_days)?;
        info!(
            symbol,
            timeframe = %timeframe,
            strategy = %kind,
            candles = series.len(),
            max_combinations,
            "optimization started"
        );

        let start = Instant::now();
        let mut relaxed = false;
        let mut candidates = self.run_pass(&series, symbol, timeframe, kind, false, max_combinations)?;

        let all_unprofitable = candidates.iter().all(|c| !c.scorecard.is_profitable());
        if all_unprofitable && self.config.relax_policy == RelaxPolicy::Automatic {
            info!(strategy = %kind, "no profitable combination, retrying with relaxed ranges");
            candidates = self.run_pass(&series, symbol, timeframe, kind, true, max_combinations)?;
            relaxed = true;
        }

        let best = best_candidate(&candidates)
            .cloned()
            .ok_or(OptimizeError::NoCandidates(kind))?;

        let record = OptimizationRecord {
            schema_version: SCHEMA_VERSION,
            strategy: kind,
            relaxed,
            timestamp: Utc::now(),
            symbol: symbol.to_string(),
            timeframe,
            best_params: best.params.clone(),
            best_result: best.scorecard.clone(),
            candidate_count: candidates.len(),
        };
        self.store.put(&StoreKey::new(kind, relaxed), &record)?;

        info!(
            strategy = %kind,
            relaxed,
            candidates = candidates.len(),
            best_return = best.scorecard.total_return,
            best_win_rate = best.scorecard.win_rate,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "optimization finished"
        );

        Ok(OptimizationOutcome {
            strategy: kind,
            symbol: symbol.to_string(),
            timeframe,
            relaxed,
            best_params: best.params,
            best: best.scorecard,
            candidates,
            record,
        })
    }

    fn fetch(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        lookback_days: u32,
    ) -> Result<Vec<Candle>, OptimizeError> {
        let count = timeframe.candles_for_days(lookback_days);
        let series = self
            .source
            .fetch_series(symbol, timeframe, count)
            .map_err(|e| OptimizeError::DataUnavailable {
                symbol: symbol.to_string(),
                reason: e.to_string(),
            })?;
        if series.len() < MIN_OPTIMIZATION_CANDLES {
            return Err(OptimizeError::DataUnavailable {
                symbol: symbol.to_string(),
                reason: format!(
                    "{} candles, need at least {MIN_OPTIMIZATION_CANDLES}",
                    series.len()
                ),
            });
        }
        Ok(series)
    }

    /// Evaluate one set of ranges. Results come back in combination order
    /// regardless of how rayon schedules them.
    fn run_pass(
        &self,
        series: &[Candle],
        symbol: &str,
        timeframe: Timeframe,
        kind: StrategyKind,
        relaxed: bool,
        max_combinations: usize,
    ) -> Result<Vec<Candidate>, OptimizeError> {
        let ranges = ParamRanges::for_pass(kind, relaxed);
        let strategies = select_combinations(kind, &ranges, max_combinations, self.config.seed);
        let total = strategies.len();
        if total == 0 {
            return Err(OptimizeError::NoCandidates(kind));
        }
        debug!(strategy = %kind, relaxed, total, "evaluating combinations");

        let done = AtomicUsize::new(0);
        let evaluate = |strategy: &Strategy| -> Result<Candidate, OptimizeError> {
            if self.cancel.is_some_and(|f| f.load(Ordering::Relaxed)) {
                return Err(OptimizeError::Cancelled);
            }
            let result = run_prepared(series, symbol, timeframe, strategy, &self.config.engine);
            let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
            if let Some(progress) = self.progress {
                progress(finished, total);
            }
            Ok(Candidate::new(result.params, result.scorecard))
        };

        if self.config.parallel {
            strategies.par_iter().map(evaluate).collect()
        } else {
            strategies.iter().map(evaluate).collect()
        }
    }
}
