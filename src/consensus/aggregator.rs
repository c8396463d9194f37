//! Weighted consensus over strategy votes

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Serialize, Serializer};

use crate::config::ConsensusConfig;
use crate::signal::{Direction, SignalResult, Tier};

/// Label for decisions reached through weighted voting
pub const REGULAR_CONSENSUS: &str = "regular_consensus";

/// What produced a decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribution {
    /// A priority strategy fired on its own
    Priority(&'static str),
    /// Weighted regular vote
    Consensus,
    /// No decision
    Unattributed,
}

impl Attribution {
    pub fn label(&self) -> &'static str {
        match self {
            Attribution::Priority(name) => name,
            Attribution::Consensus => REGULAR_CONSENSUS,
            Attribution::Unattributed => "no_signal",
        }
    }
}

impl Serialize for Attribution {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

/// The single decision for one evaluation step
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsensusDecision {
    pub direction: Direction,
    /// 1 for priority overrides, winning score over total voter weight
    /// otherwise, 0 for `NONE`
    pub confidence: Decimal,
    pub buy_score: Decimal,
    pub sell_score: Decimal,
    /// Strategies that voted for the decided direction
    pub contributing: Vec<&'static str>,
    pub attribution: Attribution,
}

impl ConsensusDecision {
    pub fn neutral(buy_score: Decimal, sell_score: Decimal) -> Self {
        Self {
            direction: Direction::Neutral,
            confidence: Decimal::ZERO,
            buy_score,
            sell_score,
            contributing: vec![],
            attribution: Attribution::Unattributed,
        }
    }
}

/// Per-side tallies over the regular voters
#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    raw: usize,
    foundational: usize,
    newer: usize,
    score: Decimal,
}

/// Resolves strategy votes into one decision
#[derive(Debug, Clone)]
pub struct ConsensusAggregator {
    config: ConsensusConfig,
}

impl ConsensusAggregator {
    pub fn new(config: ConsensusConfig) -> Self {
        Self { config }
    }

    fn weight(&self, tier: Tier) -> Decimal {
        match tier {
            Tier::Foundational => self.config.foundational_weight,
            Tier::Regular => self.config.regular_weight,
            Tier::Priority => Decimal::ZERO,
        }
    }

    fn tally(&self, signals: &[SignalResult], side: Direction) -> Tally {
        signals
            .iter()
            .filter(|s| s.tier.is_voter() && s.direction == side)
            .fold(Tally::default(), |mut t, s| {
                t.raw += 1;
                match s.tier {
                    Tier::Foundational => t.foundational += 1,
                    _ => t.newer += 1,
                }
                t.score += self.weight(s.tier);
                t
            })
    }

    fn qualifies(&self, t: &Tally) -> bool {
        t.raw >= self.config.min_raw_votes
            || (t.foundational >= self.config.min_foundational_votes
                && t.newer >= self.config.min_newer_votes)
            || t.score >= self.config.high_score
    }

    fn contributors(signals: &[SignalResult], side: Direction, priority: bool) -> Vec<&'static str> {
        signals
            .iter()
            .filter(|s| s.direction == side && (s.tier == Tier::Priority) == priority)
            .map(|s| s.strategy)
            .collect()
    }

    /// Resolve one step's votes. `signals` must be in registry order.
    pub fn decide(&self, signals: &[SignalResult]) -> ConsensusDecision {
        let buy = self.tally(signals, Direction::Buy);
        let sell = self.tally(signals, Direction::Sell);

        // Priority override, unless priority strategies disagree
        let first_priority = |side| {
            signals
                .iter()
                .find(|s| s.tier == Tier::Priority && s.direction == side)
        };
        match (first_priority(Direction::Buy), first_priority(Direction::Sell)) {
            (Some(fired), None) | (None, Some(fired)) => {
                return ConsensusDecision {
                    direction: fired.direction,
                    confidence: Decimal::ONE,
                    buy_score: buy.score,
                    sell_score: sell.score,
                    contributing: Self::contributors(signals, fired.direction, true),
                    attribution: Attribution::Priority(fired.strategy),
                };
            }
            (Some(_), Some(_)) => {
                tracing::debug!("Conflicting priority signals, falling back to weighted vote");
            }
            (None, None) => {}
        }

        let direction = match (self.qualifies(&buy), self.qualifies(&sell)) {
            (true, false) => Direction::Buy,
            (false, true) => Direction::Sell,
            (true, true) => {
                tracing::debug!(
                    buy_score = %buy.score,
                    sell_score = %sell.score,
                    "Both sides qualify, resolving tie to NONE"
                );
                Direction::Neutral
            }
            (false, false) => Direction::Neutral,
        };
        if direction == Direction::Neutral {
            return ConsensusDecision::neutral(buy.score, sell.score);
        }

        let total: Decimal = signals
            .iter()
            .filter(|s| s.tier.is_voter())
            .map(|s| self.weight(s.tier))
            .sum();
        let winning = if direction == Direction::Buy {
            buy.score
        } else {
            sell.score
        };
        let confidence = if total > dec!(0) {
            (winning / total).min(Decimal::ONE)
        } else {
            Decimal::ZERO
        };

        ConsensusDecision {
            direction,
            confidence,
            buy_score: buy.score,
            sell_score: sell.score,
            contributing: Self::contributors(signals, direction, false),
            attribution: Attribution::Consensus,
        }
    }
}

impl Default for ConsensusAggregator {
    fn default() -> Self {
        Self::new(ConsensusConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRIORITY: [&str; 4] = ["emergency", "strong_trend", "breakout", "momentum_acceleration"];
    const FOUNDATIONAL: [&str; 3] = ["macd_trend", "bollinger_rsi", "stochastic_williams"];
    const NEWER: [&str; 13] = [
        "momentum",
        "fibonacci_rsi",
        "parabolic_sar_adx",
        "volume_profile",
        "market_structure",
        "order_flow",
        "chaikin_money_flow_macd",
        "money_flow_trend",
        "roc_crossover",
        "obv_trend",
        "volatility_squeeze",
        "cci_reversal",
        "atr_channel",
    ];

    /// All-neutral vote set in registry order
    fn votes() -> Vec<SignalResult> {
        let mk = |strategy, tier| SignalResult {
            strategy,
            tier,
            direction: Direction::Neutral,
        };
        PRIORITY
            .iter()
            .map(|n| mk(*n, Tier::Priority))
            .chain(FOUNDATIONAL.iter().map(|n| mk(*n, Tier::Foundational)))
            .chain(NEWER.iter().map(|n| mk(*n, Tier::Regular)))
            .collect()
    }

    fn set(signals: &mut [SignalResult], name: &str, direction: Direction) {
        for s in signals.iter_mut().filter(|s| s.strategy == name) {
            s.direction = direction;
        }
    }

    #[test]
    fn test_all_neutral() {
        let decision = ConsensusAggregator::default().decide(&votes());
        assert_eq!(decision.direction, Direction::Neutral);
        assert_eq!(decision.confidence, dec!(0));
        assert_eq!(decision.attribution.label(), "no_signal");
    }

    #[test]
    fn test_priority_override_beats_regular_consensus() {
        let mut signals = votes();
        for name in NEWER.iter().take(6) {
            set(&mut signals, name, Direction::Sell);
        }
        set(&mut signals, "breakout", Direction::Buy);

        let decision = ConsensusAggregator::default().decide(&signals);
        assert_eq!(decision.direction, Direction::Buy);
        assert_eq!(decision.confidence, dec!(1));
        assert_eq!(decision.attribution, Attribution::Priority("breakout"));
        assert_eq!(decision.contributing, vec!["breakout"]);
    }

    #[test]
    fn test_priority_attribution_uses_registry_order() {
        let mut signals = votes();
        set(&mut signals, "momentum_acceleration", Direction::Sell);
        set(&mut signals, "strong_trend", Direction::Sell);

        let decision = ConsensusAggregator::default().decide(&signals);
        assert_eq!(decision.attribution.label(), "strong_trend");
        assert_eq!(decision.contributing, vec!["strong_trend", "momentum_acceleration"]);
    }

    #[test]
    fn test_conflicting_priority_falls_back() {
        let mut signals = votes();
        set(&mut signals, "emergency", Direction::Buy);
        set(&mut signals, "breakout", Direction::Sell);
        assert_eq!(
            ConsensusAggregator::default().decide(&signals).direction,
            Direction::Neutral
        );

        for name in FOUNDATIONAL.iter().take(2) {
            set(&mut signals, name, Direction::Sell);
        }
        for name in NEWER.iter().take(2) {
            set(&mut signals, name, Direction::Sell);
        }
        let decision = ConsensusAggregator::default().decide(&signals);
        assert_eq!(decision.direction, Direction::Sell);
        assert_eq!(decision.attribution, Attribution::Consensus);
    }

    #[test]
    fn test_foundational_plus_newer_rule() {
        let mut signals = votes();
        set(&mut signals, "macd_trend", Direction::Buy);
        set(&mut signals, "bollinger_rsi", Direction::Buy);
        set(&mut signals, "momentum", Direction::Buy);
        set(&mut signals, "order_flow", Direction::Buy);

        let decision = ConsensusAggregator::default().decide(&signals);
        assert_eq!(decision.direction, Direction::Buy);
        // 3 + 3 + 1 + 1 out of 3 * 3 + 13
        assert_eq!(decision.buy_score, dec!(8));
        assert_eq!(decision.confidence, dec!(8) / dec!(22));
        assert_eq!(decision.contributing.len(), 4);
    }

    #[test]
    fn test_raw_count_rule() {
        let mut signals = votes();
        for name in NEWER.iter().take(5) {
            set(&mut signals, name, Direction::Sell);
        }
        assert_eq!(
            ConsensusAggregator::default().decide(&signals).direction,
            Direction::Sell
        );

        set(&mut signals, NEWER[4], Direction::Neutral);
        assert_eq!(
            ConsensusAggregator::default().decide(&signals).direction,
            Direction::Neutral
        );
    }

    #[test]
    fn test_high_score_rule() {
        let mut signals = votes();
        for name in FOUNDATIONAL {
            set(&mut signals, name, Direction::Buy);
        }
        let decision = ConsensusAggregator::default().decide(&signals);
        assert_eq!(decision.direction, Direction::Buy);
        assert_eq!(decision.buy_score, dec!(9));
    }

    #[test]
    fn test_tie_resolves_to_none() {
        let mut signals = votes();
        for name in NEWER.iter().take(5) {
            set(&mut signals, name, Direction::Buy);
        }
        for name in NEWER.iter().skip(5).take(5) {
            set(&mut signals, name, Direction::Sell);
        }

        let decision = ConsensusAggregator::default().decide(&signals);
        assert_eq!(decision.direction, Direction::Neutral);
        assert_eq!(decision.buy_score, dec!(5));
        assert_eq!(decision.sell_score, dec!(5));
    }

    #[test]
    fn test_deterministic() {
        let mut signals = votes();
        set(&mut signals, "macd_trend", Direction::Sell);
        set(&mut signals, "obv_trend", Direction::Buy);
        let aggregator = ConsensusAggregator::default();
        assert_eq!(aggregator.decide(&signals), aggregator.decide(&signals));
    }
}
