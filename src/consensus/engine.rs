//! Decision engine shared by the live loop and the backtest simulator

use rust_decimal::Decimal;

use super::{ConsensusAggregator, ConsensusDecision};
use crate::config::{Config, ConsensusConfig};
use crate::feed::Candle;
use crate::indicators::{FeatureProvider, FeatureSet};
use crate::signal::{SignalContext, SignalResult, StrategyRegistry};

/// Output of one evaluation step
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub features: FeatureSet,
    pub signals: Vec<SignalResult>,
    pub decision: ConsensusDecision,
    /// Close of the window's last candle
    pub price: Decimal,
}

/// features -> signals -> consensus -> confidence gate
pub struct DecisionEngine {
    provider: FeatureProvider,
    registry: StrategyRegistry,
    aggregator: ConsensusAggregator,
    min_confidence: Decimal,
    lookback: usize,
}

impl DecisionEngine {
    /// Engine with the standard registry. `lookback` bounds the trailing
    /// window handed to the feature provider.
    pub fn new(consensus: &ConsensusConfig, lookback: usize) -> Self {
        Self {
            provider: FeatureProvider::default(),
            registry: StrategyRegistry::standard(),
            aggregator: ConsensusAggregator::new(consensus.clone()),
            min_confidence: consensus.min_confidence,
            lookback: lookback.max(1),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.consensus, config.trading.candle_limit as usize)
    }

    pub fn with_registry(mut self, registry: StrategyRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Apply new thresholds and lookback, keeping the installed registry
    pub fn reconfigure(&mut self, consensus: &ConsensusConfig, lookback: usize) {
        self.aggregator = ConsensusAggregator::new(consensus.clone());
        self.min_confidence = consensus.min_confidence;
        self.lookback = lookback.max(1);
    }

    pub fn registry(&self) -> &StrategyRegistry {
        &self.registry
    }

    pub fn lookback(&self) -> usize {
        self.lookback
    }

    /// Evaluate the trailing window ending at `candles.last()`.
    ///
    /// Returns `None` for an empty slice.
    pub fn evaluate(&self, candles: &[Candle]) -> Option<Evaluation> {
        let last = candles.last()?;
        let window = &candles[candles.len().saturating_sub(self.lookback)..];

        let features = self.provider.compute(window);
        let ctx = SignalContext::new(window, &features, last.close_f64());
        let signals = self.registry.evaluate(&ctx);
        let mut decision = self.aggregator.decide(&signals);

        if decision.direction.is_actionable() && decision.confidence < self.min_confidence {
            tracing::debug!(
                direction = %decision.direction,
                confidence = %decision.confidence,
                min_confidence = %self.min_confidence,
                "Decision below confidence gate"
            );
            decision = ConsensusDecision::neutral(decision.buy_score, decision.sell_score);
        }

        Some(Evaluation {
            features,
            signals,
            decision,
            price: last.close,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::tests::flat_candles;
    use crate::signal::{Direction, Emergency, Strategy, Tier};
    use rust_decimal_macros::dec;

    #[test]
    fn test_empty_window() {
        let engine = DecisionEngine::new(&ConsensusConfig::default(), 150);
        assert!(engine.evaluate(&[]).is_none());
    }

    #[test]
    fn test_flat_window_is_neutral() {
        let engine = DecisionEngine::new(&ConsensusConfig::default(), 150);
        let eval = engine.evaluate(&flat_candles(200)).unwrap();
        assert_eq!(eval.decision.direction, Direction::Neutral);
        assert_eq!(eval.signals.len(), 20);
        assert_eq!(eval.price, dec!(100));
        assert_eq!(eval.features.window_len, 150);
    }

    /// Priority vote that always buys
    struct AlwaysBuy;

    impl Strategy for AlwaysBuy {
        fn name(&self) -> &'static str {
            "always_buy"
        }

        fn tier(&self) -> Tier {
            Tier::Priority
        }

        fn evaluate(&self, _ctx: &SignalContext<'_>) -> Option<Direction> {
            Some(Direction::Buy)
        }
    }

    #[test]
    fn test_confidence_gate() {
        // A gate above 1 suppresses every decision, priority overrides included
        let candles = flat_candles(200);
        let open = DecisionEngine::new(&ConsensusConfig::default(), 150)
            .with_registry(StrategyRegistry::empty().with(AlwaysBuy));
        let gated = DecisionEngine::new(
            &ConsensusConfig {
                min_confidence: dec!(1.01),
                ..ConsensusConfig::default()
            },
            150,
        )
        .with_registry(StrategyRegistry::empty().with(AlwaysBuy));

        let before = open.evaluate(&candles).unwrap();
        let after = gated.evaluate(&candles).unwrap();
        assert!(before.decision.direction.is_actionable());
        assert_eq!(before.decision.direction, Direction::Buy);
        assert_eq!(after.decision.direction, Direction::Neutral);
        assert_eq!(before.signals, after.signals);
    }

    #[test]
    fn test_reconfigure_keeps_registry() {
        let mut engine = DecisionEngine::new(&ConsensusConfig::default(), 150)
            .with_registry(StrategyRegistry::empty().with(AlwaysBuy));
        engine.reconfigure(
            &ConsensusConfig {
                min_confidence: dec!(1.01),
                ..ConsensusConfig::default()
            },
            60,
        );

        assert_eq!(engine.registry().len(), 1);
        assert_eq!(engine.lookback(), 60);
        let eval = engine.evaluate(&flat_candles(200)).unwrap();
        assert_eq!(eval.features.window_len, 60);
        assert_eq!(eval.decision.direction, Direction::Neutral);
    }

    #[test]
    fn test_custom_registry() {
        let engine = DecisionEngine::new(&ConsensusConfig::default(), 150)
            .with_registry(StrategyRegistry::empty().with(Emergency));
        assert_eq!(engine.registry().len(), 1);
        let eval = engine.evaluate(&flat_candles(80)).unwrap();
        assert_eq!(eval.signals.len(), 1);
    }
}
