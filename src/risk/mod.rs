//! Risk management module
//!
//! Leverage search for order sizing, the daily circuit breaker, position
//! records and price-based exits

mod exits;
mod governor;
mod position;
mod sizing;
mod types;

pub use exits::ExitPolicy;
pub use governor::{GovernorState, RiskGovernor, RiskState};
pub use position::{ExitReason, Position, PositionBook, Side, Trade};
pub use sizing::{floor_to_step, LeverageSolver, SizingProposal};
pub use types::{RiskError, SizingError, TripReason};
