//! CLI interface for consensus-trader
//!
//! Provides subcommands for:
//! - `run`: Start the live decision loop (paper or live)
//! - `capture`: Download candle history to Parquet
//! - `backtest`: Replay history through the decision core
//! - `status`: Show the persisted bot state
//! - `config`: Show and validate the configuration

mod backtest;
mod capture;
mod run;
mod status;

pub use backtest::{BacktestArgs, OutputFormat};
pub use capture::CaptureArgs;
pub use run::RunArgs;
pub use status::StatusArgs;

use anyhow::Context;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};

use crate::config::Config;

#[derive(Parser, Debug)]
#[command(name = "consensus-trader")]
#[command(about = "Consensus-driven leveraged futures trading bot")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the live decision loop
    Run(RunArgs),
    /// Download candle history to Parquet
    Capture(CaptureArgs),
    /// Replay history through the decision core
    Backtest(BacktestArgs),
    /// Show persisted state
    Status(StatusArgs),
    /// Show and validate configuration
    Config,
}

/// History window shared by `capture` and `backtest`
#[derive(Args, Debug, Clone)]
pub struct DateRange {
    /// First day, UTC (YYYY-MM-DD)
    #[arg(long)]
    pub start: Option<NaiveDate>,

    /// Last day, UTC (YYYY-MM-DD), defaults to today
    #[arg(long)]
    pub end: Option<NaiveDate>,

    /// Days back from `end` when no start is given
    #[arg(long, default_value = "30")]
    pub days: u32,
}

impl DateRange {
    /// Resolve to `[start 00:00, end 23:59:59]` UTC
    pub fn resolve(&self, today: NaiveDate) -> anyhow::Result<(DateTime<Utc>, DateTime<Utc>)> {
        let end = self.end.unwrap_or(today);
        let start = match self.start {
            Some(start) => start,
            None => end - Duration::days(i64::from(self.days.max(1)) - 1),
        };
        anyhow::ensure!(start <= end, "start {start} is after end {end}");

        let start = start
            .and_hms_opt(0, 0, 0)
            .context("invalid start date")?
            .and_utc();
        let end = end
            .and_hms_opt(23, 59, 59)
            .context("invalid end date")?
            .and_utc();
        Ok((start, end))
    }
}

/// Symbols given on the command line, or the configured pairs
pub(crate) fn symbols_or_pairs(symbols: &[String], config: &Config) -> Vec<String> {
    if symbols.is_empty() {
        config.trading.pairs.clone()
    } else {
        symbols.iter().map(|s| s.to_uppercase()).collect()
    }
}

/// Print the effective configuration
pub fn print_config(config: &Config) {
    println!("Current configuration:");
    println!(
        "  Exchange: {:?} via {}",
        config.exchange.mode, config.exchange.base_url
    );
    println!(
        "  Trading: {} @ {}, poll {}s",
        config.trading.pairs.join(","),
        config.trading.interval,
        config.trading.poll_interval_secs
    );
    println!(
        "  Exits: trailing stop {}%, take profit {}%",
        config.trading.trailing_stop_pct, config.trading.take_profit_pct
    );
    println!(
        "  Sizing: default {}x, max {}x, step {}, min notional {}",
        config.sizing.default_leverage,
        config.sizing.max_leverage,
        config.sizing.leverage_step,
        config.sizing.min_notional
    );
    println!(
        "  Risk: daily loss {}% of {}, max {} trades/day, persist={}",
        config.risk.daily_loss_limit * rust_decimal::Decimal::ONE_HUNDRED,
        config.risk.initial_balance,
        config.risk.max_daily_trades,
        config.risk.persist_state
    );
    println!(
        "  Consensus: min votes {}, high score {}, min confidence {}",
        config.consensus.min_raw_votes, config.consensus.high_score, config.consensus.min_confidence
    );
    match config.validate() {
        Ok(()) => println!("  Valid: yes"),
        Err(e) => println!("  Valid: no ({e})"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn test_date_range_from_days() {
        let range = DateRange {
            start: None,
            end: None,
            days: 7,
        };
        let (start, end) = range.resolve(day("2024-03-10")).unwrap();
        assert_eq!(start.to_rfc3339(), "2024-03-04T00:00:00+00:00");
        assert_eq!(end.to_rfc3339(), "2024-03-10T23:59:59+00:00");
    }

    #[test]
    fn test_date_range_rejects_inverted() {
        let range = DateRange {
            start: Some(day("2024-03-10")),
            end: Some(day("2024-03-01")),
            days: 30,
        };
        assert!(range.resolve(day("2024-03-10")).is_err());
    }

    #[test]
    fn test_cli_parses_backtest_symbols() {
        let cli = Cli::parse_from([
            "consensus-trader",
            "backtest",
            "--symbols",
            "btcusdt,ethusdt",
            "--start",
            "2024-01-01",
        ]);
        let Commands::Backtest(args) = cli.command else {
            panic!("expected backtest");
        };
        assert_eq!(args.symbols, vec!["btcusdt", "ethusdt"]);
        assert_eq!(args.range.start, Some(day("2024-01-01")));
        assert_eq!(cli.config, "config.toml");
    }
}
