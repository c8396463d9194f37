//! Priority strategies
//!
//! These fire on fewer confirmations than the voters and can trigger a
//! trade on their own.

use super::{pct_change, ratio, Direction, SignalContext, Strategy, Tier};
use crate::feed::Candle;

/// At least two of three foundational readings agree: RSI extreme, MACD
/// histogram cross, Bollinger band touch.
#[derive(Debug, Default, Clone, Copy)]
pub struct Emergency;

impl Strategy for Emergency {
    fn name(&self) -> &'static str {
        "emergency"
    }

    fn tier(&self) -> Tier {
        Tier::Priority
    }

    fn evaluate(&self, ctx: &SignalContext<'_>) -> Option<Direction> {
        let cur = &ctx.features.current;
        let prev = &ctx.features.previous;

        let rsi = Direction::from_conditions(cur.rsi < 30.0, cur.rsi > 70.0);
        let hist = Direction::from_conditions(
            prev.macd_hist <= 0.0 && cur.macd_hist > 0.0,
            prev.macd_hist >= 0.0 && cur.macd_hist < 0.0,
        );
        let band = if cur.bb_upper > cur.bb_lower {
            Direction::from_conditions(ctx.price <= cur.bb_lower, ctx.price >= cur.bb_upper)
        } else {
            Direction::Neutral
        };

        let votes = [rsi, hist, band];
        let buys = votes.iter().filter(|d| **d == Direction::Buy).count();
        let sells = votes.iter().filter(|d| **d == Direction::Sell).count();
        Some(Direction::from_conditions(buys >= 2, sells >= 2))
    }
}

/// Multi-factor alignment: moving averages, MACD, directional movement,
/// volume, five-candle change and close position within the candle range.
#[derive(Debug, Default, Clone, Copy)]
pub struct StrongTrend;

impl Strategy for StrongTrend {
    fn name(&self) -> &'static str {
        "strong_trend"
    }

    fn tier(&self) -> Tier {
        Tier::Priority
    }

    fn evaluate(&self, ctx: &SignalContext<'_>) -> Option<Direction> {
        let f = &ctx.features.current;
        let last = ctx.back(0)?;
        let five_back = ctx.back(5)?;

        let volume_ratio = ratio(f.volume, f.volume_sma)?;
        let change = pct_change(five_back.close_f64(), last.close_f64())?;
        let range = last.high_f64() - last.low_f64();
        let close_pos = ratio(last.close_f64() - last.low_f64(), range)?;

        let trending = f.adx > 25.0 && volume_ratio > 1.2;
        let buy = trending
            && f.sma_fast > f.sma_slow
            && f.macd > f.macd_signal
            && f.plus_di > f.minus_di
            && change > 1.0
            && close_pos >= 0.75;
        let sell = trending
            && f.sma_fast < f.sma_slow
            && f.macd < f.macd_signal
            && f.minus_di > f.plus_di
            && change < -1.0
            && close_pos <= 0.25;
        Some(Direction::from_conditions(buy, sell))
    }
}

/// Close clears the prior 20-candle extreme on 1.5x average volume
#[derive(Debug, Clone, Copy)]
pub struct Breakout {
    pub lookback: usize,
}

impl Default for Breakout {
    fn default() -> Self {
        Self { lookback: 20 }
    }
}

impl Strategy for Breakout {
    fn name(&self) -> &'static str {
        "breakout"
    }

    fn tier(&self) -> Tier {
        Tier::Priority
    }

    fn evaluate(&self, ctx: &SignalContext<'_>) -> Option<Direction> {
        let f = &ctx.features.current;
        let window = ctx.tail(self.lookback + 1);
        let (prior, _) = window.split_at(window.len().checked_sub(1)?);
        if prior.is_empty() {
            return None;
        }

        let prior_high = prior.iter().map(Candle::high_f64).fold(f64::NEG_INFINITY, f64::max);
        let prior_low = prior.iter().map(Candle::low_f64).fold(f64::INFINITY, f64::min);
        let volume_ratio = ratio(f.volume, f.volume_sma)?;
        let confirmed = volume_ratio > 1.5;

        Some(Direction::from_conditions(
            confirmed && ctx.price > prior_high,
            confirmed && ctx.price < prior_low,
        ))
    }
}

/// Price, volume and RSI momentum all accelerating in the same direction
#[derive(Debug, Default, Clone, Copy)]
pub struct MomentumAcceleration;

impl Strategy for MomentumAcceleration {
    fn name(&self) -> &'static str {
        "momentum_acceleration"
    }

    fn tier(&self) -> Tier {
        Tier::Priority
    }

    fn evaluate(&self, ctx: &SignalContext<'_>) -> Option<Direction> {
        let fs = ctx.features;
        let (c0, c1, c2) = (ctx.back(0)?, ctx.back(1)?, ctx.back(2)?);

        // Velocities in percent, newest first
        let v_now = pct_change(c1.close_f64(), c0.close_f64())?;
        let v_before = pct_change(c2.close_f64(), c1.close_f64())?;
        let accel = v_now - v_before;

        let volume_rising = c0.volume_f64() > c1.volume_f64() && c1.volume_f64() > c2.volume_f64();
        let rsi_now = fs.current.rsi - fs.previous.rsi;
        let rsi_before = fs.previous.rsi - fs.earlier.rsi;

        let buy = v_now > 0.3
            && accel > 0.0
            && volume_rising
            && rsi_now > rsi_before
            && rsi_before > 0.0
            && fs.current.rsi < 75.0;
        let sell = v_now < -0.3
            && accel < 0.0
            && volume_rising
            && rsi_now < rsi_before
            && rsi_before < 0.0
            && fs.current.rsi > 25.0;
        Some(Direction::from_conditions(buy, sell))
    }
}
