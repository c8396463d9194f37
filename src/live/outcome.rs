//! Per-symbol and per-cycle results

use std::fmt;

use crate::risk::{Position, Trade, TripReason};

/// Why an opening order was not placed
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    CircuitBreaker(TripReason),
    /// No leverage up to the ceiling satisfies the exchange minimums
    Infeasible(String),
    InvalidInput(&'static str),
}

impl SkipReason {
    /// Metric label
    pub fn label(&self) -> &'static str {
        match self {
            SkipReason::CircuitBreaker(_) => "circuit_breaker",
            SkipReason::Infeasible(_) => "infeasible",
            SkipReason::InvalidInput(_) => "invalid_input",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::CircuitBreaker(reason) => write!(f, "circuit breaker: {reason}"),
            SkipReason::Infeasible(detail) => write!(f, "infeasible: {detail}"),
            SkipReason::InvalidInput(detail) => write!(f, "invalid input: {detail}"),
        }
    }
}

/// What happened to one symbol in one cycle
#[derive(Debug, Clone, PartialEq)]
pub enum SymbolOutcome {
    /// Not enough candles to evaluate
    NoData,
    /// No position and no actionable decision
    Idle,
    /// Position kept open
    Held,
    Opened(Position),
    Closed(Trade),
    Skipped(SkipReason),
    /// Exchange call failed; the loop moved on
    Failed(String),
}

/// Outcomes of one pass over the tracked pairs
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub outcomes: Vec<(String, SymbolOutcome)>,
}

impl CycleReport {
    pub fn outcome(&self, symbol: &str) -> Option<&SymbolOutcome> {
        self.outcomes
            .iter()
            .find(|(s, _)| s == symbol)
            .map(|(_, o)| o)
    }

    pub fn opened(&self) -> usize {
        self.count(|o| matches!(o, SymbolOutcome::Opened(_)))
    }

    pub fn closed(&self) -> usize {
        self.count(|o| matches!(o, SymbolOutcome::Closed(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, SymbolOutcome::Failed(_)))
    }

    fn count(&self, pred: impl Fn(&SymbolOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|(_, o)| pred(o)).count()
    }
}
