//! LevLab CLI — backtest, optimize, show, and portfolio commands.
//!
//! Commands:
//! - `backtest`: run one strategy over a CSV candle file and print a report
//! - `optimize`: grid-search a strategy's parameters and store the best set
//! - `show`: print the freshest stored optimization for a strategy
//! - `portfolio`: pick the best strategy per symbol and save the selection

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use levlab_core::data::take_latest;
use levlab_core::domain::Timeframe;
use levlab_core::strategy::{StrategyKind, StrategyParams};
use levlab_runner::export::{format_profit_factor, generate_report, save_artifacts};
use levlab_runner::{
    load_latest, run_backtest, select_portfolio, CsvSource, LevlabConfig, Optimizer,
};

#[derive(Parser)]
#[command(name = "levlab", about = "LevLab: leveraged strategy backtesting and tuning")]
struct Cli {
    /// Path to a TOML config file. Missing files fall back to defaults.
    #[arg(long, global = true, default_value = "levlab.toml")]
    config: PathBuf,

    /// Directory holding `{SYMBOL}_{timeframe}.csv` candle files.
    #[arg(long, global = true, default_value = "data")]
    data_dir: PathBuf,

    /// Override the optimization store directory.
    #[arg(long, global = true)]
    store_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one strategy over a candle file.
    Backtest {
        #[arg(long)]
        symbol: String,

        /// Candle timeframe (1m, 5m, 15m, 30m, 1h, 4h, 1d).
        #[arg(long, default_value = "1h")]
        timeframe: Timeframe,

        /// Strategy id: ma or rsi.
        #[arg(long)]
        strategy: StrategyKind,

        /// Parameter override as name=value; repeatable.
        #[arg(long = "param", value_parser = parse_param)]
        params: Vec<(String, f64)>,

        /// Use only the most recent N candles.
        #[arg(long)]
        candles: Option<usize>,

        /// Write manifest, trades, equity, and indicator files here.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Search a strategy's parameter grid and store the best set.
    Optimize {
        #[arg(long)]
        symbol: String,

        #[arg(long, default_value = "1h")]
        timeframe: Timeframe,

        #[arg(long)]
        strategy: StrategyKind,

        /// Days of history to fetch. Defaults to the config value.
        #[arg(long)]
        lookback_days: Option<u32>,

        /// Maximum combinations evaluated per pass. Defaults to the config value.
        #[arg(long)]
        max_combinations: Option<usize>,

        /// Number of top candidates to print.
        #[arg(long, default_value_t = 5)]
        top: usize,

        /// Evaluate combinations on a single thread.
        #[arg(long, default_value_t = false)]
        sequential: bool,
    },
    /// Print the freshest stored optimization for a strategy.
    Show {
        #[arg(long)]
        strategy: StrategyKind,
    },
    /// Optimize both strategies per symbol and keep the best symbols.
    Portfolio {
        /// Symbols to evaluate (e.g., BTCUSDT ETHUSDT).
        #[arg(required = true)]
        symbols: Vec<String>,

        #[arg(long, default_value = "1h")]
        timeframe: Timeframe,

        /// Number of symbols to keep.
        #[arg(long, default_value_t = 3)]
        size: usize,

        #[arg(long)]
        lookback_days: Option<u32>,

        #[arg(long)]
        max_combinations: Option<usize>,

        /// Directory for the `portfolio_config_*.json` file.
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut config = LevlabConfig::load_or_default(&cli.config)
        .with_context(|| format!("loading config {}", cli.config.display()))?;
    if let Some(dir) = cli.store_dir {
        config.store.dir = dir;
    }
    let source = CsvSource::new(&cli.data_dir);

    match cli.command {
        Commands::Backtest {
            symbol,
            timeframe,
            strategy,
            params,
            candles,
            output_dir,
        } => run_backtest_cmd(
            &config,
            &source,
            &symbol,
            timeframe,
            strategy,
            StrategyParams::from_pairs(params),
            candles,
            output_dir.as_deref(),
        ),
        Commands::Optimize {
            symbol,
            timeframe,
            strategy,
            lookback_days,
            max_combinations,
            top,
            sequential,
        } => {
            if sequential {
                config.optimizer.parallel = false;
            }
            let lookback = lookback_days.unwrap_or(config.optimizer.lookback_days);
            let budget = max_combinations.unwrap_or(config.optimizer.max_combinations);
            run_optimize(&config, &source, &symbol, timeframe, strategy, lookback, budget, top)
        }
        Commands::Show { strategy } => run_show(&config, strategy),
        Commands::Portfolio {
            symbols,
            timeframe,
            size,
            lookback_days,
            max_combinations,
            output_dir,
        } => {
            let lookback = lookback_days.unwrap_or(config.optimizer.lookback_days);
            let budget = max_combinations.unwrap_or(config.optimizer.max_combinations);
            run_portfolio(&config, &source, &symbols, timeframe, lookback, budget, size, &output_dir)
        }
    }
}

fn parse_param(raw: &str) -> Result<(String, f64), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got '{raw}'"))?;
    let value: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("'{value}' is not a number"))?;
    Ok((name.trim().to_string(), value))
}

#[allow(clippy::too_many_arguments)]
fn run_backtest_cmd(
    config: &LevlabConfig,
    source: &CsvSource,
    symbol: &str,
    timeframe: Timeframe,
    strategy: StrategyKind,
    overrides: StrategyParams,
    candles: Option<usize>,
    output_dir: Option<&Path>,
) -> Result<()> {
    let mut series = source
        .load(symbol, timeframe)
        .with_context(|| format!("loading {}", source.path_for(symbol, timeframe).display()))?;
    if let Some(n) = candles {
        series = take_latest(series, n);
    }
    info!(%symbol, %timeframe, candles = series.len(), "running backtest");

    let result = run_backtest(&series, symbol, timeframe, strategy, &overrides, &config.engine)?;
    println!("{}", generate_report(&result));

    if let Some(dir) = output_dir {
        let run_dir = save_artifacts(&result, &series, dir)
            .with_context(|| format!("saving artifacts under {}", dir.display()))?;
        println!("Artifacts saved to: {}", run_dir.display());
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_optimize(
    config: &LevlabConfig,
    source: &CsvSource,
    symbol: &str,
    timeframe: Timeframe,
    strategy: StrategyKind,
    lookback_days: u32,
    max_combinations: usize,
    top: usize,
) -> Result<()> {
    let store = config.store.open();
    let progress = |done: usize, total: usize| {
        if done == total || done % 10 == 0 {
            info!(done, total, "optimization progress");
        }
    };
    let optimizer = Optimizer::new(source, &store, config.optimizer_config()).with_progress(&progress);
    let outcome = optimizer.optimize(symbol, timeframe, strategy, lookback_days, max_combinations)?;

    println!();
    println!("=== Optimization: {strategy} on {symbol} {timeframe} ===");
    if outcome.relaxed {
        println!("(relaxed ranges: no profitable set in the normal grid)");
    }
    println!("Candidates:     {}", outcome.candidates.len());
    println!("Best params:    {}", format_params(&outcome.best_params));
    println!("Total Return:   {:.2}", outcome.best.total_return);
    println!("Win Rate:       {:.1}%", outcome.best.win_rate * 100.0);
    println!("Profit Factor:  {}", format_profit_factor(outcome.best.profit_factor));
    println!("Max Drawdown:   {:.2}%", outcome.best.max_drawdown * 100.0);
    println!();
    println!("{:<4} {:>12} {:>9} {:>7}  Params", "#", "Return", "WinRate", "Trades");
    for (i, c) in outcome.top(top).iter().enumerate() {
        println!(
            "{:<4} {:>12.2} {:>8.1}% {:>7}  {}",
            i + 1,
            c.scorecard.total_return,
            c.scorecard.win_rate * 100.0,
            c.scorecard.total_trades,
            format_params(&c.params)
        );
    }
    println!();
    println!("Stored in: {}", store.latest_path(&outcome.record.key()).display());
    Ok(())
}

fn run_show(config: &LevlabConfig, strategy: StrategyKind) -> Result<()> {
    let store = config.store.open();
    let Some(record) = load_latest(&store, strategy, Utc::now(), config.store.stale_after()) else {
        println!(
            "No fresh optimization for {strategy} in {} (stale after {} days).",
            store.dir().display(),
            config.store.stale_after_days
        );
        return Ok(());
    };

    println!("Strategy:       {}{}", record.strategy, if record.relaxed { " (relaxed)" } else { "" });
    println!("Optimized at:   {}", record.timestamp.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("Symbol:         {} {}", record.symbol, record.timeframe);
    println!("Candidates:     {}", record.candidate_count);
    println!("Params:         {}", format_params(&record.best_params));
    println!("Total Return:   {:.2}", record.best_result.total_return);
    println!("Win Rate:       {:.1}%", record.best_result.win_rate * 100.0);
    println!("Profit Factor:  {}", format_profit_factor(record.best_result.profit_factor));
    println!("Max Drawdown:   {:.2}%", record.best_result.max_drawdown * 100.0);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_portfolio(
    config: &LevlabConfig,
    source: &CsvSource,
    symbols: &[String],
    timeframe: Timeframe,
    lookback_days: u32,
    max_combinations: usize,
    size: usize,
    output_dir: &Path,
) -> Result<()> {
    if size == 0 {
        bail!("--size must be at least 1");
    }
    let store = config.store.open();
    let optimizer = Optimizer::new(source, &store, config.optimizer_config());
    let entries = select_portfolio(&optimizer, symbols, timeframe, lookback_days, max_combinations, size)?;

    if entries.is_empty() {
        println!("No symbol produced a usable optimization.");
        return Ok(());
    }

    println!();
    println!("{:<12} {:<9} {:>12} {:>9} {:>9}", "Symbol", "Strategy", "Return", "WinRate", "MaxDD");
    println!("{}", "-".repeat(55));
    for e in &entries {
        println!(
            "{:<12} {:<9} {:>12.2} {:>8.1}% {:>8.2}%",
            e.symbol,
            e.strategy.to_string(),
            e.total_return,
            e.win_rate * 100.0,
            e.max_drawdown * 100.0
        );
    }

    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("creating {}", output_dir.display()))?;
    let path = output_dir.join(format!(
        "portfolio_config_{}.json",
        Utc::now().format("%Y%m%d_%H%M%S")
    ));
    let json = serde_json::to_string_pretty(&entries)?;
    std::fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
    println!();
    println!("Portfolio saved to: {}", path.display());
    Ok(())
}

fn format_params(params: &StrategyParams) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(" ")
}
