//! Configuration loading

use consensus_trader::config::{Config, ConfigError, ExecutionMode, LogFormat};
use rust_decimal_macros::dec;
use std::io::Write;
use tempfile::NamedTempFile;
use tokio_test::{assert_err, assert_ok};

#[test]
fn test_example_config_loads_and_validates() {
    let config: Config = toml::from_str(include_str!("../../config.toml.example")).unwrap();

    assert_eq!(config.exchange.mode, ExecutionMode::Paper);
    assert_eq!(config.trading.pairs, vec!["BTCUSDT", "ETHUSDT", "BNBUSDT"]);
    assert_eq!(config.trading.candle_limit, 150);
    assert_eq!(config.sizing.leverage_step, 5);
    assert_eq!(config.risk.daily_loss_limit, dec!(0.05));
    assert_eq!(config.telemetry.log_format, LogFormat::Pretty);
    assert!(config.validate().is_ok());
}

#[test]
fn test_load_rejects_invalid_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
        [trading]
        pairs = ["BTCUSDT"]

        [sizing]
        max_leverage = 200
        "#
    )
    .unwrap();

    let err = assert_err!(Config::load(file.path()));
    assert_eq!(
        err.downcast_ref::<ConfigError>(),
        Some(&ConfigError::LeverageCeiling(200))
    );
}

#[test]
fn test_minimal_file_gets_defaults() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "[trading]\npairs = [\"SOLUSDT\"]").unwrap();

    let config = assert_ok!(Config::load(file.path()));
    assert_eq!(config.trading.interval, "15m");
    assert_eq!(config.backtest.initial_balance, dec!(1000));
    assert_eq!(config.state.history_cap, 100);
    assert!(!config.risk.persist_state);
}
