//! Static strategy registry

use super::{
    AtrChannel, BollingerRsi, Breakout, CciReversal, ChaikinMoneyFlowMacd, Emergency,
    FibonacciRsi, MacdTrend, MarketStructure, Momentum, MomentumAcceleration, MoneyFlowTrend,
    ObvTrend, OrderFlow, ParabolicSarAdx, RocCrossover, SignalContext, SignalResult,
    StochasticWilliams, Strategy, StrongTrend, Tier, VolatilitySqueeze, VolumeProfile,
};

/// Fixed, ordered list of strategies. Order matters: priority overrides are
/// attributed to the first firing priority strategy.
pub struct StrategyRegistry {
    strategies: Vec<Box<dyn Strategy>>,
}

impl StrategyRegistry {
    /// Registry with no strategies
    pub fn empty() -> Self {
        Self { strategies: vec![] }
    }

    /// The full production set: 4 priority, 3 foundational, 13 regular
    pub fn standard() -> Self {
        Self::empty()
            .with(Emergency)
            .with(StrongTrend)
            .with(Breakout::default())
            .with(MomentumAcceleration)
            .with(MacdTrend)
            .with(BollingerRsi)
            .with(StochasticWilliams)
            .with(Momentum)
            .with(FibonacciRsi)
            .with(ParabolicSarAdx)
            .with(VolumeProfile)
            .with(MarketStructure)
            .with(OrderFlow)
            .with(ChaikinMoneyFlowMacd)
            .with(MoneyFlowTrend)
            .with(RocCrossover)
            .with(ObvTrend)
            .with(VolatilitySqueeze::default())
            .with(CciReversal)
            .with(AtrChannel::default())
    }

    /// Append a strategy
    pub fn with(mut self, strategy: impl Strategy + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    /// Evaluate every strategy, in registry order
    pub fn evaluate(&self, ctx: &SignalContext<'_>) -> Vec<SignalResult> {
        self.strategies.iter().map(|s| s.signal(ctx)).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Strategy> {
        self.strategies.iter().map(|s| s.as_ref())
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.iter().map(|s| s.name()).collect()
    }

    pub fn count_tier(&self, tier: Tier) -> usize {
        self.iter().filter(|s| s.tier() == tier).count()
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
