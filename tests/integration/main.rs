//! Integration tests for consensus-trader

mod backtest_test;
mod config_test;
mod live_test;
mod support;
