//! Risk management types

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Why the circuit breaker tripped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TripReason {
    /// Daily realized P&L reached the loss limit
    DailyLoss { pnl: Decimal, limit: Decimal },
    /// Daily trade count reached the maximum
    TradeCount { count: u32, max: u32 },
}

impl fmt::Display for TripReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TripReason::DailyLoss { pnl, limit } => {
                write!(f, "daily loss {pnl} reached limit -{limit}")
            }
            TripReason::TradeCount { count, max } => {
                write!(f, "daily trade count {count} reached maximum {max}")
            }
        }
    }
}

/// Risk management errors
#[derive(Debug, Error, PartialEq)]
pub enum RiskError {
    /// New orders are blocked until the next trading day
    #[error("Circuit breaker tripped: {0}")]
    CircuitBreakerTripped(TripReason),
    /// At most one open position per symbol
    #[error("Position already open for {0}")]
    PositionExists(String),
}

/// Position sizing errors
#[derive(Debug, Error, PartialEq)]
pub enum SizingError {
    /// No leverage up to the ceiling satisfies the notional and margin
    /// constraints
    #[error(
        "Insufficient capital for {symbol}: best notional {best_notional} at {ceiling}x, minimum {min_notional}"
    )]
    Infeasible {
        symbol: String,
        ceiling: u32,
        best_notional: Decimal,
        min_notional: Decimal,
    },
    /// Non-positive price, step size or balance
    #[error("Invalid sizing input: {0}")]
    InvalidInput(&'static str),
}
