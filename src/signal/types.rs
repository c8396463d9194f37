//! Signal types

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::feed::Candle;
use crate::indicators::FeatureSet;

/// Trade direction voted by a strategy or decided by consensus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Buy,
    Sell,
    #[default]
    #[serde(rename = "NONE")]
    Neutral,
}

impl Direction {
    /// Resolve a pair of conditions. Both true is contradictory and yields
    /// `Neutral`.
    pub fn from_conditions(buy: bool, sell: bool) -> Self {
        match (buy, sell) {
            (true, false) => Direction::Buy,
            (false, true) => Direction::Sell,
            _ => Direction::Neutral,
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            Direction::Buy => Direction::Sell,
            Direction::Sell => Direction::Buy,
            Direction::Neutral => Direction::Neutral,
        }
    }

    pub fn is_actionable(&self) -> bool {
        !matches!(self, Direction::Neutral)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::Buy => "BUY",
            Direction::Sell => "SELL",
            Direction::Neutral => "NONE",
        })
    }
}

/// Strategy tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Can trigger a trade on its own
    Priority,
    /// Regular voter with the heavy consensus weight
    Foundational,
    /// Regular voter with unit weight
    Regular,
}

impl Tier {
    pub fn is_voter(&self) -> bool {
        !matches!(self, Tier::Priority)
    }
}

/// One strategy's vote for one evaluation step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SignalResult {
    pub strategy: &'static str,
    pub tier: Tier,
    pub direction: Direction,
}

/// Inputs shared by every strategy in one evaluation step
#[derive(Debug, Clone, Copy)]
pub struct SignalContext<'a> {
    /// Normalized candle window, oldest first
    pub candles: &'a [Candle],
    /// Features for the window's last candle
    pub features: &'a FeatureSet,
    /// Price the decision is taken at
    pub price: f64,
}

impl<'a> SignalContext<'a> {
    pub fn new(candles: &'a [Candle], features: &'a FeatureSet, price: f64) -> Self {
        Self {
            candles,
            features,
            price,
        }
    }

    /// Candle `n` steps back from the last one (0 = last)
    pub fn back(&self, n: usize) -> Option<&'a Candle> {
        self.candles.len().checked_sub(n + 1).map(|i| &self.candles[i])
    }

    /// The most recent `n` candles
    pub fn tail(&self, n: usize) -> &'a [Candle] {
        &self.candles[self.candles.len().saturating_sub(n)..]
    }
}
