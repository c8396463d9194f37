//! Consensus module
//!
//! Resolves the strategy votes of one evaluation step into a single
//! decision, and wires the feature provider, strategy registry and
//! aggregator into the [`DecisionEngine`] both the live loop and the
//! backtest drive.

mod aggregator;
mod engine;

pub use aggregator::{Attribution, ConsensusAggregator, ConsensusDecision, REGULAR_CONSENSUS};
pub use engine::{DecisionEngine, Evaluation};
