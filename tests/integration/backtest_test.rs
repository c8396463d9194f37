//! Backtest replay through the standard decision core

use consensus_trader::backtest::{report_path, write_report, BacktestResult, BacktestSimulator};
use consensus_trader::consensus::DecisionEngine;
use consensus_trader::data::{CandleReader, CandleWriter};
use consensus_trader::feed::Interval;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tempfile::TempDir;

use crate::support::{test_config, wave};

#[test]
fn test_replay_accounting_is_consistent() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path(), &["BTCUSDT"]);
    let simulator = BacktestSimulator::from_config(&config);
    let candles = wave(600);

    let result = simulator.run("BTCUSDT", &candles);

    assert_eq!(result.candles, 600);
    assert_eq!(result.evaluated, 600 - simulator.start_index());
    assert_eq!(result.initial_balance, dec!(1000));
    assert_eq!(
        result.final_balance,
        result.initial_balance + result.total_pnl
    );
    assert_eq!(result.wins + result.losses, result.total_trades);
    assert_eq!(result.trades.len(), result.total_trades);
    assert!(result.max_drawdown >= Decimal::ZERO && result.max_drawdown <= Decimal::ONE);

    let signals: usize = result.strategies.iter().map(|s| s.signals).sum();
    assert_eq!(signals, result.total_trades);
}

#[test]
fn test_live_and_replay_engines_agree() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path(), &["BTCUSDT"]);
    let simulator = BacktestSimulator::from_config(&config);
    let live = DecisionEngine::from_config(&config);
    let candles = wave(400);

    for end in [120, 200, 333, 400] {
        let history = &candles[..end];
        // live only ever sees the latest candle_limit candles
        let polled = &history[history.len().saturating_sub(150)..];

        let replayed = simulator.engine().evaluate(history).unwrap();
        let fetched = live.evaluate(polled).unwrap();
        assert_eq!(replayed.decision, fetched.decision, "diverged at {end}");
        assert_eq!(replayed.price, fetched.price);
    }
}

#[test]
fn test_report_round_trip() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path(), &["ETHUSDT"]);
    let result = BacktestSimulator::from_config(&config).run("ETHUSDT", &wave(300));

    let path = write_report(&result, dir.path()).unwrap();
    assert_eq!(path, report_path(dir.path(), "ETHUSDT"));
    assert!(path.ends_with("backtest_report_ETHUSDT.json"));

    let loaded: BacktestResult =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(loaded, result);
}

#[test]
fn test_parquet_cache_replays_identically() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path(), &["BTCUSDT"]);
    let simulator = BacktestSimulator::from_config(&config);
    let candles = wave(300);

    let writer = CandleWriter::new(dir.path().join("data"));
    let path = writer
        .write("BTCUSDT", Interval::FifteenMinutes, &candles)
        .unwrap();
    let cached = CandleReader::new(path).read_symbol("BTCUSDT").unwrap();

    assert_eq!(cached, candles);
    assert_eq!(
        simulator.run("BTCUSDT", &cached),
        simulator.run("BTCUSDT", &candles)
    );
}

#[test]
fn test_risk_limits_never_allow_more_trades() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(dir.path(), &["BTCUSDT"]);
    config.backtest.holding_candles = 1;
    let candles = wave(800);

    let free = BacktestSimulator::from_config(&config).run("BTCUSDT", &candles);

    config.backtest.apply_risk_limits = true;
    config.risk.max_daily_trades = 2;
    let capped = BacktestSimulator::from_config(&config).run("BTCUSDT", &candles);

    assert!(capped.total_trades <= free.total_trades);
    // 800 quarter-hours span nine UTC days
    assert!(capped.total_trades <= 9 * 2);
    assert_eq!(free.circuit_breaker_trips, 0);
}
