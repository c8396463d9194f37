//! Live decision loop
//!
//! Polls every tracked pair once per cycle, sequentially, and drives the
//! shared decision engine, risk governor and leverage solver against an
//! [`Exchange`](crate::exchange::Exchange). Shutdown is cooperative: the
//! loop stops between cycles, never between an order and its bookkeeping.

mod outcome;
mod trader;

pub use outcome::{CycleReport, SkipReason, SymbolOutcome};
pub use trader::LiveLoop;
