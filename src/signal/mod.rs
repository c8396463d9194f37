//! Signal strategies
//!
//! Each strategy is a pure evaluator over the candle window and its feature
//! set, returning a [`Direction`] vote. Degenerate math inside a strategy
//! (zero denominators, missing history) downgrades its vote to `NONE` so one
//! broken evaluator never blocks the others.

mod foundational;
mod priority;
mod registry;
mod regular;
mod types;

pub use foundational::{BollingerRsi, MacdTrend, StochasticWilliams};
pub use priority::{Breakout, Emergency, MomentumAcceleration, StrongTrend};
pub use registry::StrategyRegistry;
pub use regular::{
    AtrChannel, CciReversal, ChaikinMoneyFlowMacd, FibonacciRsi, MarketStructure, Momentum,
    MoneyFlowTrend, ObvTrend, OrderFlow, ParabolicSarAdx, RocCrossover, VolatilitySqueeze,
    VolumeProfile,
};
pub use types::{Direction, SignalContext, SignalResult, Tier};

use crate::indicators::MIN_WINDOW;

/// A signal strategy
pub trait Strategy: Send + Sync {
    /// Stable strategy name, used for attribution and statistics
    fn name(&self) -> &'static str;

    fn tier(&self) -> Tier;

    /// Evaluate the window. `None` means the inputs were degenerate.
    fn evaluate(&self, ctx: &SignalContext<'_>) -> Option<Direction>;

    /// Evaluate with the window-length guard applied
    fn signal(&self, ctx: &SignalContext<'_>) -> SignalResult {
        let direction = if ctx.candles.len() < MIN_WINDOW || !(ctx.price.is_finite() && ctx.price > 0.0)
        {
            Direction::Neutral
        } else {
            self.evaluate(ctx).unwrap_or_else(|| {
                tracing::trace!(strategy = self.name(), "Degenerate inputs, voting NONE");
                Direction::Neutral
            })
        };

        SignalResult {
            strategy: self.name(),
            tier: self.tier(),
            direction,
        }
    }
}

/// Percent change from `from` to `to`
pub(crate) fn pct_change(from: f64, to: f64) -> Option<f64> {
    ratio(to - from, from).map(|r| r * 100.0)
}

/// `num / den`, or `None` when the result would not be finite
pub(crate) fn ratio(num: f64, den: f64) -> Option<f64> {
    if den == 0.0 {
        return None;
    }
    let r = num / den;
    r.is_finite().then_some(r)
}
