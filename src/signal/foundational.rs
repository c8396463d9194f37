//! Foundational voters
//!
//! The three oldest paired-indicator heuristics. They carry the heavy
//! consensus weight.

use super::{Direction, SignalContext, Strategy, Tier};

/// MACD crossover confirmed by the moving-average trend
#[derive(Debug, Default, Clone, Copy)]
pub struct MacdTrend;

impl Strategy for MacdTrend {
    fn name(&self) -> &'static str {
        "macd_trend"
    }

    fn tier(&self) -> Tier {
        Tier::Foundational
    }

    fn evaluate(&self, ctx: &SignalContext<'_>) -> Option<Direction> {
        let cur = &ctx.features.current;
        let prev = &ctx.features.previous;

        let bullish = prev.macd <= prev.macd_signal
            && cur.macd > cur.macd_signal
            && cur.sma_fast > cur.sma_slow;
        let bearish = prev.macd >= prev.macd_signal
            && cur.macd < cur.macd_signal
            && cur.sma_fast < cur.sma_slow;
        Some(Direction::from_conditions(bullish, bearish))
    }
}

/// Bollinger band touch with an RSI extreme
#[derive(Debug, Default, Clone, Copy)]
pub struct BollingerRsi;

impl Strategy for BollingerRsi {
    fn name(&self) -> &'static str {
        "bollinger_rsi"
    }

    fn tier(&self) -> Tier {
        Tier::Foundational
    }

    fn evaluate(&self, ctx: &SignalContext<'_>) -> Option<Direction> {
        let f = &ctx.features.current;
        // Collapsed bands carry no information
        if f.bb_upper <= f.bb_lower {
            return None;
        }
        Some(Direction::from_conditions(
            ctx.price <= f.bb_lower && f.rsi < 30.0,
            ctx.price >= f.bb_upper && f.rsi > 70.0,
        ))
    }
}

/// Stochastic %K and Williams %R both at an extreme
#[derive(Debug, Default, Clone, Copy)]
pub struct StochasticWilliams;

impl Strategy for StochasticWilliams {
    fn name(&self) -> &'static str {
        "stochastic_williams"
    }

    fn tier(&self) -> Tier {
        Tier::Foundational
    }

    fn evaluate(&self, ctx: &SignalContext<'_>) -> Option<Direction> {
        let f = &ctx.features.current;
        Some(Direction::from_conditions(
            f.stoch_k < 20.0 && f.williams_r < -80.0,
            f.stoch_k > 80.0 && f.williams_r > -20.0,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::tests::flat_candles;
    use crate::indicators::{FeatureProvider, FeatureSet};

    fn flat_features(edit: impl FnOnce(&mut FeatureSet)) -> FeatureSet {
        let mut features = FeatureProvider::default().compute(&flat_candles(80));
        edit(&mut features);
        features
    }

    #[test]
    fn test_macd_trend_bullish_cross() {
        let candles = flat_candles(80);
        let features = flat_features(|f| {
            f.previous.macd = -0.1;
            f.previous.macd_signal = 0.0;
            f.current.macd = 0.2;
            f.current.macd_signal = 0.1;
            f.current.sma_fast = 101.0;
            f.current.sma_slow = 100.0;
        });
        let ctx = SignalContext::new(&candles, &features, 100.0);
        assert_eq!(MacdTrend.signal(&ctx).direction, Direction::Buy);
    }

    #[test]
    fn test_macd_trend_needs_sma_confirmation() {
        let candles = flat_candles(80);
        let features = flat_features(|f| {
            f.previous.macd = -0.1;
            f.current.macd = 0.2;
            f.current.sma_fast = 99.0;
            f.current.sma_slow = 100.0;
        });
        let ctx = SignalContext::new(&candles, &features, 100.0);
        assert_eq!(MacdTrend.signal(&ctx).direction, Direction::Neutral);
    }

    #[test]
    fn test_bollinger_rsi_sell_at_upper_band() {
        let candles = flat_candles(80);
        let features = flat_features(|f| {
            f.current.bb_upper = 102.0;
            f.current.bb_lower = 98.0;
            f.current.rsi = 75.0;
        });
        let ctx = SignalContext::new(&candles, &features, 102.5);
        assert_eq!(BollingerRsi.signal(&ctx).direction, Direction::Sell);
    }

    #[test]
    fn test_bollinger_rsi_collapsed_bands() {
        let candles = flat_candles(80);
        let features = flat_features(|f| f.current.rsi = 10.0);
        let ctx = SignalContext::new(&candles, &features, 100.0);
        assert_eq!(BollingerRsi.signal(&ctx).direction, Direction::Neutral);
    }

    #[test]
    fn test_stochastic_williams_oversold() {
        let candles = flat_candles(80);
        let features = flat_features(|f| {
            f.current.stoch_k = 12.0;
            f.current.williams_r = -92.0;
        });
        let ctx = SignalContext::new(&candles, &features, 100.0);
        assert_eq!(StochasticWilliams.signal(&ctx).direction, Direction::Buy);
    }

    #[test]
    fn test_short_window_is_neutral() {
        let candles = flat_candles(10);
        let features = flat_features(|f| {
            f.current.stoch_k = 12.0;
            f.current.williams_r = -92.0;
        });
        let ctx = SignalContext::new(&candles, &features, 100.0);
        assert_eq!(StochasticWilliams.signal(&ctx).direction, Direction::Neutral);
    }
}
