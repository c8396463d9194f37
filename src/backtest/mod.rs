//! Backtesting module
//!
//! Replays a historical candle series through the same decision engine the
//! live loop uses, with a simplified fixed-fraction sizing rule, and derives
//! summary statistics from the resulting trade log and balance samples.

mod analytics;
mod ledger;
mod report;
mod simulator;

pub use analytics::{BacktestResult, StrategyStats};
pub use ledger::Ledger;
pub use report::{report_path, write_report};
pub use simulator::BacktestSimulator;
