//! Reporting and export — JSON, CSV, and Markdown artifact generation.
//!
//! - **JSON**: full round-trip serialization with schema versioning
//! - **CSV**: trade ledger, equity curve, and a per-candle indicator log
//! - **Markdown**: human-readable single-run report
//!
//! Persisted results carry a `schema_version`; newer versions are rejected on
//! load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use levlab_core::domain::{Candle, EquityPoint, TradeRecord};
use levlab_core::indicators::IndicatorSet;

use crate::runner::{BacktestResult, SCHEMA_VERSION};

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize a `BacktestResult` to pretty JSON.
pub fn export_json(result: &BacktestResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("failed to serialize BacktestResult to JSON")
}

/// Deserialize a `BacktestResult` from JSON, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<BacktestResult> {
    let result: BacktestResult =
        serde_json::from_str(json).context("failed to deserialize BacktestResult from JSON")?;
    if result.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            result.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(result)
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Blank for NaN so spreadsheets show a gap rather than "NaN".
fn cell(value: f64, decimals: usize) -> String {
    if value.is_nan() {
        String::new()
    } else {
        format!("{value:.decimals$}")
    }
}

fn opt_cell(value: Option<f64>, decimals: usize) -> String {
    value.map(|v| cell(v, decimals)).unwrap_or_default()
}

fn finish(wtr: csv::Writer<Vec<u8>>) -> Result<String> {
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Export the trade ledger, one row per open or close.
pub fn export_trades_csv(trades: &[TradeRecord]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "timestamp",
        "symbol",
        "side",
        "price",
        "amount",
        "value",
        "margin",
        "commission",
        "pnl",
        "pnl_pct",
        "exit_reason",
        "balance",
    ])?;

    for t in trades {
        wtr.write_record([
            t.timestamp.to_rfc3339(),
            t.symbol.clone(),
            t.side.to_string(),
            cell(t.price, 6),
            cell(t.amount, 6),
            cell(t.value, 2),
            opt_cell(t.margin, 2),
            cell(t.commission, 4),
            opt_cell(t.pnl, 2),
            opt_cell(t.pnl_pct, 2),
            t.exit_reason.map(|r| r.label().to_string()).unwrap_or_default(),
            cell(t.balance, 2),
        ])?;
    }
    finish(wtr)
}

/// Export the equity curve, one row per candle.
pub fn export_equity_csv(equity_curve: &[EquityPoint]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["timestamp", "equity", "balance", "position_value"])?;
    for p in equity_curve {
        wtr.write_record([
            p.timestamp.to_rfc3339(),
            cell(p.equity, 2),
            cell(p.balance, 2),
            cell(p.position_value, 2),
        ])?;
    }
    finish(wtr)
}

/// Per-candle indicator values alongside account state.
///
/// Columns: timestamp, close, rsi, macd, signal, stoch_k, stoch_d,
/// macd_crossover, equity, balance. Undefined values are left blank; equity
/// columns are blank past the end of `equity_curve`.
pub fn export_indicator_log(candles: &[Candle], equity_curve: &[EquityPoint]) -> Result<String> {
    let set = IndicatorSet::compute(candles);
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "timestamp",
        "close",
        "rsi",
        "macd",
        "signal",
        "stoch_k",
        "stoch_d",
        "macd_crossover",
        "equity",
        "balance",
    ])?;

    for (i, c) in candles.iter().enumerate() {
        let point = equity_curve.get(i);
        wtr.write_record([
            c.timestamp.to_rfc3339(),
            cell(c.close, 6),
            cell(set.rsi[i], 2),
            cell(set.macd[i], 6),
            cell(set.signal[i], 6),
            cell(set.stoch_k[i], 2),
            cell(set.stoch_d[i], 2),
            set.macd_crossover[i].map(|x| x.to_string()).unwrap_or_default(),
            opt_cell(point.map(|p| p.equity), 2),
            opt_cell(point.map(|p| p.balance), 2),
        ])?;
    }
    finish(wtr)
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save the full artifact set for a single backtest run.
///
/// Creates `{symbol}_{strategy}_{timestamp}/` under `output_dir` containing
/// `manifest.json`, `trades.csv`, `equity.csv` and `indicators.csv`.
/// Returns the path to the created directory.
pub fn save_artifacts(result: &BacktestResult, candles: &[Candle], output_dir: &Path) -> Result<PathBuf> {
    let dirname = format!(
        "{}_{}_{}",
        result.symbol,
        result.strategy,
        chrono::Utc::now().format("%Y%m%d_%H%M%S")
    );
    let run_dir = output_dir.join(dirname);
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    std::fs::write(run_dir.join("manifest.json"), export_json(result)?)?;
    std::fs::write(run_dir.join("trades.csv"), export_trades_csv(&result.trades)?)?;
    std::fs::write(run_dir.join("equity.csv"), export_equity_csv(&result.equity_curve)?)?;
    std::fs::write(
        run_dir.join("indicators.csv"),
        export_indicator_log(candles, &result.equity_curve)?,
    )?;

    Ok(run_dir)
}

/// Load a `BacktestResult` from an artifact directory's manifest.json.
pub fn load_artifacts(dir: &Path) -> Result<BacktestResult> {
    let manifest_path = dir.join("manifest.json");
    let json = std::fs::read_to_string(&manifest_path)
        .with_context(|| format!("failed to read {}", manifest_path.display()))?;
    import_json(&json)
}

// ─── Markdown report ────────────────────────────────────────────────

/// Generate a Markdown report for a single backtest run.
pub fn generate_report(result: &BacktestResult) -> String {
    let mut md = String::with_capacity(1024);
    let s = &result.scorecard;

    md.push_str("# Backtest Report\n\n");

    md.push_str("## Run\n\n");
    md.push_str("| Field | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Symbol | {} |\n", result.symbol));
    md.push_str(&format!("| Timeframe | {} |\n", result.timeframe));
    md.push_str(&format!("| Strategy | {} |\n", result.strategy));
    if let (Some(start), Some(end)) = (s.period_start, s.period_end) {
        md.push_str(&format!(
            "| Period | {} to {} |\n",
            start.format("%Y-%m-%d %H:%M"),
            end.format("%Y-%m-%d %H:%M")
        ));
    }
    md.push_str(&format!("| Candles | {} |\n", result.equity_curve.len()));
    md.push('\n');

    md.push_str("## Parameters\n\n");
    for (name, value) in result.params.iter() {
        md.push_str(&format!("- `{name}` = {value}\n"));
    }
    md.push('\n');

    md.push_str("## Performance Summary\n\n");
    md.push_str("| Metric | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Initial Balance | ${:.2} |\n", s.initial_balance));
    md.push_str(&format!("| Final Balance | ${:.2} |\n", s.final_balance));
    md.push_str(&format!(
        "| Total Return | ${:.2} ({:.2}%) |\n",
        s.total_return, s.total_return_pct
    ));
    md.push_str(&format!("| Max Drawdown | {:.2}% |\n", s.max_drawdown * 100.0));
    md.push_str(&format!("| Win Rate | {:.1}% |\n", s.win_rate * 100.0));
    md.push_str(&format!("| Profit Factor | {} |\n", format_profit_factor(s.profit_factor)));
    md.push_str(&format!(
        "| Trades | {} ({} buys, {} sells) |\n",
        s.total_trades, s.buy_trades, s.sell_trades
    ));
    md.push_str(&format!("| Realized P&L | ${:.2} |\n", s.total_pnl));
    md.push_str(&format!("| Commission | ${:.2} |\n", s.total_commission));
    md.push('\n');

    md
}

pub fn format_profit_factor(pf: f64) -> String {
    if pf.is_infinite() {
        "∞".to_string()
    } else {
        format!("{pf:.2}")
    }
}
