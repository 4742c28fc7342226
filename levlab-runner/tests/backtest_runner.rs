//! Integration tests for the runner: real strategies on synthetic series.
//!
//! Verifies scorecards end to end, serde round trips, idempotence, and the
//! short-series and decreasing-series edge cases.

use chrono::{Duration, TimeZone, Utc};

use levlab_core::domain::{Candle, ExitReason, Timeframe};
use levlab_core::engine::EngineConfig;
use levlab_core::strategy::{SignalGenerator, Strategy, StrategyKind, StrategyParams};
use levlab_runner::metrics::Scorecard;
use levlab_runner::runner::run_backtest;
use levlab_runner::RunError;

fn candles_from_closes(closes: &[f64]) -> Vec<Candle> {
    let base = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Candle {
                timestamp: base + Duration::hours(i as i64),
                open,
                high: open.max(close) + 1.0,
                low: open.min(close) - 1.0,
                close,
                volume: 1000.0,
            }
        })
        .collect()
}

fn wave(n: usize) -> Vec<Candle> {
    let closes: Vec<f64> = (0..n)
        .map(|i| 100.0 + (i as f64 * 0.35).sin() * 6.0 + i as f64 * 0.02)
        .collect();
    candles_from_closes(&closes)
}

fn run(series: &[Candle], kind: StrategyKind, overrides: &StrategyParams) -> levlab_runner::BacktestResult {
    run_backtest(
        series,
        "BTCUSDT",
        Timeframe::H1,
        kind,
        overrides,
        &EngineConfig::default(),
    )
    .unwrap()
}

// ─── Edge cases ──────────────────────────────────────────────────────

#[test]
fn short_series_scores_zero() {
    for kind in StrategyKind::ALL {
        let strategy = Strategy::build(kind, &StrategyParams::new()).unwrap();
        let series = wave(strategy.min_history() - 1);
        let result = run(&series, kind, &StrategyParams::new());
        let s = &result.scorecard;
        assert_eq!(s.total_trades, 0, "{kind}");
        assert_eq!(s.win_rate, 0.0);
        assert_eq!(s.profit_factor, 0.0);
        assert_eq!(s.total_return, 0.0);
        assert_eq!(s.max_drawdown, 0.0);
        assert_eq!(s.final_balance, s.initial_balance);
    }
}

#[test]
fn decreasing_series_ma_never_trades() {
    // 100 candles closing 100, 99, ..., 1.
    let closes: Vec<f64> = (0..100).map(|i| 100.0 - i as f64).collect();
    let overrides = StrategyParams::new()
        .with("short_period", 5.0)
        .with("long_period", 20.0);
    let result = run(&candles_from_closes(&closes), StrategyKind::Ma, &overrides);
    assert_eq!(result.scorecard.total_trades, 0);
    assert_eq!(result.scorecard.total_return, 0.0);
    assert_eq!(result.scorecard.final_balance, result.scorecard.initial_balance);

    // Flat throughout and at the end.
    assert_eq!(result.equity_curve.len(), 100);
    assert!(result.equity_curve.iter().all(|p| p.position_value == 0.0));
    let last = result.equity_curve.last().unwrap();
    assert_eq!(last.equity, last.balance);
}

#[test]
fn empty_series_is_not_an_error() {
    let result = run(&[], StrategyKind::Rsi, &StrategyParams::new());
    assert!(result.trades.is_empty());
    assert!(result.equity_curve.is_empty());
    assert_eq!(result.scorecard.period_start, None);
}

#[test]
fn oversized_overrides_are_rejected_not_panicking() {
    for (kind, name, value) in [
        (StrategyKind::Ma, "max_hold_hours", 1e10),
        (StrategyKind::Ma, "max_hold_hours", 1e13),
        (StrategyKind::Ma, "long_period", 1e20),
        (StrategyKind::Rsi, "rsi_period", 1e20),
    ] {
        let overrides = StrategyParams::new().with(name, value);
        let err = run_backtest(
            &wave(300),
            "BTCUSDT",
            Timeframe::H1,
            kind,
            &overrides,
            &EngineConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, RunError::InvalidParameter(_)), "{name}={value}");
    }
}

#[test]
fn invalid_override_fails_fast() {
    let overrides = StrategyParams::new().with("rsi_buy", 80.0).with("rsi_sell", 70.0);
    let err = run_backtest(
        &wave(100),
        "BTCUSDT",
        Timeframe::H1,
        StrategyKind::Rsi,
        &overrides,
        &EngineConfig::default(),
    )
    .unwrap_err();
    assert!(matches!(err, RunError::InvalidParameter(_)));
}

// ─── Scorecard consistency ──────────────────────────────────────────

#[test]
fn scorecard_agrees_with_ledger() {
    let series = wave(400);
    let result = run(&series, StrategyKind::Ma, &StrategyParams::new());
    let s = &result.scorecard;
    assert!(s.total_trades > 0);
    assert_eq!(s.buy_trades, s.sell_trades);
    assert_eq!(s.total_trades, result.trades.len());

    let pnl: f64 = result.trades.iter().filter_map(|t| t.pnl).sum();
    assert!((s.total_pnl - pnl).abs() < 1e-9);
    // Realized P&L already nets both commissions, so it equals the balance change.
    assert!((s.total_return - s.total_pnl).abs() < 1e-6);
    assert!((0.0..=1.0).contains(&s.win_rate));
    assert!(s.max_drawdown >= 0.0);
    assert_eq!(s.period_start, Some(series[0].timestamp));
    assert_eq!(s.period_end, Some(series[399].timestamp));
}

#[test]
fn scorecard_serde_roundtrip() {
    let result = run(&wave(300), StrategyKind::Ma, &StrategyParams::new());
    let json = serde_json::to_string(&result.scorecard).unwrap();
    let back: Scorecard = serde_json::from_str(&json).unwrap();
    assert_eq!(back, result.scorecard);
}

#[test]
fn runs_are_idempotent() {
    let series = wave(300);
    for kind in StrategyKind::ALL {
        let a = run(&series, kind, &StrategyParams::new());
        let b = run(&series, kind, &StrategyParams::new());
        assert_eq!(a, b, "{kind}");
    }
}

// ─── RSI dip and rally ──────────────────────────────────────────────

#[test]
fn rsi_dip_and_rally_scores_one_winner() {
    let mut closes: Vec<f64> = (0..20).map(|i| 120.0 - i as f64).collect();
    closes.extend([100.0, 99.0, 98.0, 99.0, 100.0, 99.0, 98.0, 97.5, 98.5]);
    closes.extend((0..12).map(|k| 99.5 + 1.5 * k as f64));
    let overrides = StrategyParams::new()
        .with("stop_loss", -0.5)
        .with("take_profit", 0.5)
        .with("max_hold_hours", 1000.0);

    let config = EngineConfig::default();
    let result = run(&candles_from_closes(&closes), StrategyKind::Rsi, &overrides);
    let s = &result.scorecard;
    assert_eq!(s.total_trades, 2);

    // Realized P&L on the SELL: margin × leverage × (exit − entry) / entry,
    // less the entry and exit commissions.
    let (open, close) = (&result.trades[0], &result.trades[1]);
    let margin = open.margin.unwrap();
    let expected = margin * config.leverage * (close.price - open.price) / open.price
        - open.commission
        - close.commission;
    assert!((close.pnl.unwrap() - expected).abs() < 1e-9);
    assert!((s.total_pnl - expected).abs() < 1e-9);
    assert_eq!(s.win_rate, 1.0);
    assert_eq!(s.profit_factor, f64::INFINITY);
    assert!(s.total_return > 0.0);
    assert_eq!(result.trades[1].exit_reason, Some(ExitReason::Signal));

    let json = serde_json::to_string(s).unwrap();
    assert!(json.contains(r#""profit_factor":"inf""#));
}
