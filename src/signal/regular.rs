//! Newer regular voters
//!
//! Each carries unit weight in the consensus.

use super::{pct_change, ratio, Direction, SignalContext, Strategy, Tier};
use crate::feed::Candle;

macro_rules! regular_strategy {
    ($ty:ident, $name:literal) => {
        impl $ty {
            pub const NAME: &'static str = $name;
        }
    };
}

/// Price change, volume spike and rising RSI on the last candle
#[derive(Debug, Default, Clone, Copy)]
pub struct Momentum;
regular_strategy!(Momentum, "momentum");

impl Strategy for Momentum {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn tier(&self) -> Tier {
        Tier::Regular
    }

    fn evaluate(&self, ctx: &SignalContext<'_>) -> Option<Direction> {
        let fs = ctx.features;
        let change = pct_change(ctx.back(1)?.close_f64(), ctx.price)?;
        let spike = ratio(fs.current.volume, fs.current.volume_sma)? > 1.3;
        let rsi_delta = fs.current.rsi - fs.previous.rsi;

        Some(Direction::from_conditions(
            change > 0.2 && spike && rsi_delta > 0.5,
            change < -0.2 && spike && rsi_delta < -0.5,
        ))
    }
}

/// Pullback to a Fibonacci retracement of the last 50-candle swing, in the
/// direction of the moving-average trend
#[derive(Debug, Default, Clone, Copy)]
pub struct FibonacciRsi;
regular_strategy!(FibonacciRsi, "fibonacci_rsi");

const FIB_LEVELS: [f64; 3] = [0.382, 0.5, 0.618];

impl Strategy for FibonacciRsi {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn tier(&self) -> Tier {
        Tier::Regular
    }

    fn evaluate(&self, ctx: &SignalContext<'_>) -> Option<Direction> {
        let f = &ctx.features.current;
        let swing = ctx.tail(50);
        let high = swing.iter().map(Candle::high_f64).fold(f64::NEG_INFINITY, f64::max);
        let low = swing.iter().map(Candle::low_f64).fold(f64::INFINITY, f64::min);
        let range = high - low;
        if !(range > 0.0) {
            return None;
        }

        let near = |level: f64| (ctx.price - level).abs() / ctx.price < 0.005;
        let near_support = FIB_LEVELS.iter().any(|r| near(high - r * range));
        let near_resistance = FIB_LEVELS.iter().any(|r| near(low + r * range));

        Some(Direction::from_conditions(
            f.sma_fast > f.sma_slow && near_support && f.rsi < 45.0,
            f.sma_fast < f.sma_slow && near_resistance && f.rsi > 55.0,
        ))
    }
}

/// Price against the parabolic SAR with directional-movement confirmation
#[derive(Debug, Default, Clone, Copy)]
pub struct ParabolicSarAdx;
regular_strategy!(ParabolicSarAdx, "parabolic_sar_adx");

impl Strategy for ParabolicSarAdx {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn tier(&self) -> Tier {
        Tier::Regular
    }

    fn evaluate(&self, ctx: &SignalContext<'_>) -> Option<Direction> {
        let f = &ctx.features.current;
        let trending = f.adx > 20.0;
        Some(Direction::from_conditions(
            trending && ctx.price > f.psar && f.plus_di > f.minus_di,
            trending && ctx.price < f.psar && f.minus_di > f.plus_di,
        ))
    }
}

/// High-volume moves: continuation on strong spikes, exhaustion on
/// moderate ones
#[derive(Debug, Default, Clone, Copy)]
pub struct VolumeProfile;
regular_strategy!(VolumeProfile, "volume_profile");

impl Strategy for VolumeProfile {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn tier(&self) -> Tier {
        Tier::Regular
    }

    fn evaluate(&self, ctx: &SignalContext<'_>) -> Option<Direction> {
        let f = &ctx.features.current;
        let volume_ratio = ratio(f.volume, f.volume_sma)?;
        let change = pct_change(ctx.back(1)?.close_f64(), ctx.price)?;

        if volume_ratio > 1.5 {
            let d = Direction::from_conditions(
                change > 1.0 && f.rsi < 70.0,
                change < -1.0 && f.rsi > 30.0,
            );
            if d.is_actionable() {
                return Some(d);
            }
        }
        if volume_ratio > 1.3 {
            return Some(Direction::from_conditions(
                change < 0.5 && f.rsi < 40.0,
                change > 0.5 && f.rsi > 60.0,
            ));
        }
        Some(Direction::Neutral)
    }
}

/// Proximity to support or resistance from the last 20 candles' extremes
#[derive(Debug, Default, Clone, Copy)]
pub struct MarketStructure;
regular_strategy!(MarketStructure, "market_structure");

fn mean_of_extremes(mut values: Vec<f64>, take: usize, largest: bool) -> Option<f64> {
    values.retain(|v| v.is_finite());
    values.sort_by(|a, b| a.total_cmp(b));
    if largest {
        values.reverse();
    }
    let picked = &values[..take.min(values.len())];
    ratio(picked.iter().sum(), picked.len() as f64)
}

impl Strategy for MarketStructure {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn tier(&self) -> Tier {
        Tier::Regular
    }

    fn evaluate(&self, ctx: &SignalContext<'_>) -> Option<Direction> {
        let recent = ctx.tail(20);
        let resistance = mean_of_extremes(recent.iter().map(Candle::high_f64).collect(), 3, true)?;
        let support = mean_of_extremes(recent.iter().map(Candle::low_f64).collect(), 3, false)?;
        let rsi = ctx.features.current.rsi;

        let to_resistance = ratio(resistance - ctx.price, ctx.price)? * 100.0;
        let to_support = ratio(ctx.price - support, ctx.price)? * 100.0;

        if to_resistance < 2.0 && rsi > 55.0 {
            Some(Direction::Sell)
        } else if to_support < 2.0 && rsi < 45.0 {
            Some(Direction::Buy)
        } else {
            Some(Direction::Neutral)
        }
    }
}

/// Large-bodied candle on rising volume
#[derive(Debug, Default, Clone, Copy)]
pub struct OrderFlow;
regular_strategy!(OrderFlow, "order_flow");

impl Strategy for OrderFlow {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn tier(&self) -> Tier {
        Tier::Regular
    }

    fn evaluate(&self, ctx: &SignalContext<'_>) -> Option<Direction> {
        let (cur, prev) = (ctx.back(0)?, ctx.back(1)?);
        let body = cur.close_f64() - cur.open_f64();
        let recent = ctx.tail(10);
        let avg_body = ratio(
            recent.iter().map(|c| (c.close_f64() - c.open_f64()).abs()).sum(),
            recent.len() as f64,
        )?;
        if avg_body <= 0.0 {
            return None;
        }

        let confirmed = cur.volume_f64() > prev.volume_f64() * 1.1 && body.abs() > avg_body * 1.3;
        Some(Direction::from_conditions(
            confirmed && body > 0.0,
            confirmed && body < 0.0,
        ))
    }
}

/// Chaikin money flow sign agreeing with MACD direction
#[derive(Debug, Default, Clone, Copy)]
pub struct ChaikinMoneyFlowMacd;
regular_strategy!(ChaikinMoneyFlowMacd, "chaikin_money_flow_macd");

impl Strategy for ChaikinMoneyFlowMacd {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn tier(&self) -> Tier {
        Tier::Regular
    }

    fn evaluate(&self, ctx: &SignalContext<'_>) -> Option<Direction> {
        let f = &ctx.features.current;
        Some(Direction::from_conditions(
            f.cmf > 0.0 && f.macd > f.macd_signal,
            f.cmf < 0.0 && f.macd < f.macd_signal,
        ))
    }
}

/// Money flow extreme against the prevailing moving-average trend
#[derive(Debug, Default, Clone, Copy)]
pub struct MoneyFlowTrend;
regular_strategy!(MoneyFlowTrend, "money_flow_trend");

impl Strategy for MoneyFlowTrend {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn tier(&self) -> Tier {
        Tier::Regular
    }

    fn evaluate(&self, ctx: &SignalContext<'_>) -> Option<Direction> {
        let f = &ctx.features.current;
        Some(Direction::from_conditions(
            f.mfi < 30.0 && f.sma_fast > f.sma_slow,
            f.mfi > 70.0 && f.sma_fast < f.sma_slow,
        ))
    }
}

/// Rate of change crossing zero with MACD agreement
#[derive(Debug, Default, Clone, Copy)]
pub struct RocCrossover;
regular_strategy!(RocCrossover, "roc_crossover");

impl Strategy for RocCrossover {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn tier(&self) -> Tier {
        Tier::Regular
    }

    fn evaluate(&self, ctx: &SignalContext<'_>) -> Option<Direction> {
        let (cur, prev) = (&ctx.features.current, &ctx.features.previous);
        Some(Direction::from_conditions(
            prev.roc <= 0.0 && cur.roc > 0.0 && cur.macd > cur.macd_signal,
            prev.roc >= 0.0 && cur.roc < 0.0 && cur.macd < cur.macd_signal,
        ))
    }
}

/// On-balance volume crossing its average, confirmed by price
#[derive(Debug, Default, Clone, Copy)]
pub struct ObvTrend;
regular_strategy!(ObvTrend, "obv_trend");

impl Strategy for ObvTrend {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn tier(&self) -> Tier {
        Tier::Regular
    }

    fn evaluate(&self, ctx: &SignalContext<'_>) -> Option<Direction> {
        let (cur, prev) = (&ctx.features.current, &ctx.features.previous);
        Some(Direction::from_conditions(
            prev.obv <= prev.obv_sma && cur.obv > cur.obv_sma && ctx.price > cur.sma_fast,
            prev.obv >= prev.obv_sma && cur.obv < cur.obv_sma && ctx.price < cur.sma_fast,
        ))
    }
}

/// Band breakout after a Bollinger squeeze
#[derive(Debug, Clone, Copy)]
pub struct VolatilitySqueeze {
    /// Bandwidth under which the bands count as squeezed
    pub squeeze_bandwidth: f64,
}
regular_strategy!(VolatilitySqueeze, "volatility_squeeze");

impl Default for VolatilitySqueeze {
    fn default() -> Self {
        Self {
            squeeze_bandwidth: 0.03,
        }
    }
}

impl Strategy for VolatilitySqueeze {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn tier(&self) -> Tier {
        Tier::Regular
    }

    fn evaluate(&self, ctx: &SignalContext<'_>) -> Option<Direction> {
        let (cur, prev) = (&ctx.features.current, &ctx.features.previous);
        let squeezed = prev.bb_bandwidth > 0.0 && prev.bb_bandwidth < self.squeeze_bandwidth;
        let volume = cur.volume > cur.volume_sma;
        Some(Direction::from_conditions(
            squeezed && volume && ctx.price > cur.bb_upper,
            squeezed && volume && ctx.price < cur.bb_lower,
        ))
    }
}

/// CCI returning from an extreme
#[derive(Debug, Default, Clone, Copy)]
pub struct CciReversal;
regular_strategy!(CciReversal, "cci_reversal");

impl Strategy for CciReversal {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn tier(&self) -> Tier {
        Tier::Regular
    }

    fn evaluate(&self, ctx: &SignalContext<'_>) -> Option<Direction> {
        let (cur, prev) = (&ctx.features.current, &ctx.features.previous);
        Some(Direction::from_conditions(
            prev.cci < -100.0 && cur.cci >= -100.0,
            prev.cci > 100.0 && cur.cci <= 100.0,
        ))
    }
}

/// Close breaking out of an ATR channel around the fast average in a
/// trending market
#[derive(Debug, Clone, Copy)]
pub struct AtrChannel {
    pub multiplier: f64,
}
regular_strategy!(AtrChannel, "atr_channel");

impl Default for AtrChannel {
    fn default() -> Self {
        Self { multiplier: 1.5 }
    }
}

impl Strategy for AtrChannel {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn tier(&self) -> Tier {
        Tier::Regular
    }

    fn evaluate(&self, ctx: &SignalContext<'_>) -> Option<Direction> {
        let (cur, prev) = (&ctx.features.current, &ctx.features.previous);
        if cur.atr <= 0.0 || prev.atr <= 0.0 {
            return None;
        }
        let upper = |r: &crate::indicators::FeatureRow| r.sma_fast + self.multiplier * r.atr;
        let lower = |r: &crate::indicators::FeatureRow| r.sma_fast - self.multiplier * r.atr;
        let trending = cur.adx > 20.0;

        Some(Direction::from_conditions(
            trending && prev.close <= upper(prev) && ctx.price > upper(cur),
            trending && prev.close >= lower(prev) && ctx.price < lower(cur),
        ))
    }
}
