//! consensus-trader: consensus-driven leveraged futures trading bot
//!
//! This library provides the core components for:
//! - Candle ingest and normalisation
//! - Technical indicator features over a candle window
//! - Twenty voting strategies and their consensus
//! - Leverage-aware position sizing and a daily circuit breaker
//! - A live decision loop with trailing stop and take profit exits
//! - Backtesting through the same decision core
//! - Binance futures and paper exchanges
//! - Parquet candle cache, persisted state and notifications
//! - Full observability stack

pub mod backtest;
pub mod cli;
pub mod config;
pub mod consensus;
pub mod data;
pub mod exchange;
pub mod feed;
pub mod indicators;
pub mod live;
pub mod notify;
pub mod risk;
pub mod signal;
pub mod state;
pub mod telemetry;
