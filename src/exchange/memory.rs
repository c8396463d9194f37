//! In-memory market data

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{ExchangeError, MarketData, SymbolRules};
use crate::feed::{normalize_candles, Candle, Interval};

/// Market data served from candles held in memory.
///
/// Backs paper trading over recorded data and the integration tests.
/// The interval argument is ignored; each symbol holds a single series.
#[derive(Default)]
pub struct InMemoryMarket {
    candles: RwLock<HashMap<String, Vec<Candle>>>,
    rules: RwLock<HashMap<String, SymbolRules>>,
}

impl InMemoryMarket {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_candles(mut self, symbol: impl Into<String>, candles: Vec<Candle>) -> Self {
        self.candles
            .get_mut()
            .insert(symbol.into(), normalize_candles(candles));
        self
    }

    pub fn with_rules(mut self, rules: SymbolRules) -> Self {
        self.rules.get_mut().insert(rules.symbol.clone(), rules);
        self
    }

    /// Append a candle, replacing the last one when timestamps match
    pub async fn push_candle(&self, symbol: &str, candle: Candle) {
        let mut guard = self.candles.write().await;
        let series = guard.entry(symbol.to_string()).or_default();
        match series.last_mut() {
            Some(last) if last.timestamp == candle.timestamp => *last = candle,
            _ => {
                series.push(candle);
                if series.len() > 1 && series[series.len() - 2].timestamp > candle.timestamp {
                    let sorted = normalize_candles(std::mem::take(series));
                    *series = sorted;
                }
            }
        }
    }

    pub async fn len(&self, symbol: &str) -> usize {
        self.candles
            .read()
            .await
            .get(symbol)
            .map_or(0, Vec::len)
    }
}

#[async_trait]
impl MarketData for InMemoryMarket {
    async fn get_candles(
        &self,
        symbol: &str,
        _interval: Interval,
        limit: u32,
    ) -> Result<Vec<Candle>, ExchangeError> {
        let guard = self.candles.read().await;
        let series = guard
            .get(symbol)
            .ok_or_else(|| ExchangeError::UnknownSymbol(symbol.to_string()))?;
        let start = series.len().saturating_sub(limit as usize);
        Ok(series[start..].to_vec())
    }

    async fn get_candles_between(
        &self,
        symbol: &str,
        _interval: Interval,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<Candle>, ExchangeError> {
        let guard = self.candles.read().await;
        let series = guard
            .get(symbol)
            .ok_or_else(|| ExchangeError::UnknownSymbol(symbol.to_string()))?;
        Ok(series
            .iter()
            .filter(|c| c.timestamp >= start && c.timestamp <= end)
            .take(limit as usize)
            .copied()
            .collect())
    }

    async fn symbol_rules(&self, symbol: &str) -> Result<SymbolRules, ExchangeError> {
        Ok(self
            .rules
            .read()
            .await
            .get(symbol)
            .cloned()
            .unwrap_or_else(|| SymbolRules::fallback(symbol)))
    }
}
