//! Shared fixtures: synthetic candle series and a scripted exchange

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use consensus_trader::config::{Config, ConsensusConfig};
use consensus_trader::consensus::DecisionEngine;
use consensus_trader::exchange::{
    AccountState, Exchange, ExchangeError, MarketData, OrderFill, OrderRequest, SymbolRules,
};
use consensus_trader::feed::{Candle, Interval};
use consensus_trader::signal::{Direction, SignalContext, Strategy, StrategyRegistry, Tier};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::VecDeque;
use std::path::Path;
use tokio::sync::Mutex;

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

/// 15m candles from a close path; high/low straddle the close by 0.5%
pub fn candles_from(closes: &[f64]) -> Vec<Candle> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let d = |v: f64| Decimal::from_f64(v).unwrap().round_dp(8);
            let open = if i == 0 { close } else { closes[i - 1] };
            Candle::new(
                start_time() + Duration::minutes(15 * i as i64),
                d(open),
                d(close.max(open) * 1.005),
                d(close.min(open) * 0.995),
                d(close),
                d(1000.0 + 400.0 * ((i as f64) * 0.7).sin().abs()),
            )
        })
        .collect()
}

/// Trend legs with noise, enough to make strategies disagree and agree
pub fn wave(n: usize) -> Vec<Candle> {
    let closes: Vec<f64> = (0..n)
        .map(|i| {
            let t = i as f64;
            30_000.0 + 1500.0 * (t / 40.0).sin() + 300.0 * (t / 7.0).cos() + 5.0 * t
        })
        .collect();
    candles_from(&closes)
}

pub fn rising(n: usize) -> Vec<Candle> {
    let closes: Vec<f64> = (0..n).map(|i| 100.0 + i as f64).collect();
    candles_from(&closes)
}

/// Priority strategy that follows the last close-to-close move
pub struct FollowLastMove;

impl Strategy for FollowLastMove {
    fn name(&self) -> &'static str {
        "follow_last_move"
    }

    fn tier(&self) -> Tier {
        Tier::Priority
    }

    fn evaluate(&self, ctx: &SignalContext<'_>) -> Option<Direction> {
        let last = ctx.back(0)?.close;
        let prev = ctx.back(1)?.close;
        Some(Direction::from_conditions(last > prev, last < prev))
    }
}

pub fn follow_engine() -> DecisionEngine {
    DecisionEngine::new(&ConsensusConfig::default(), 150)
        .with_registry(StrategyRegistry::empty().with(FollowLastMove))
}

/// Minimal config pointing persisted state at `dir`
pub fn test_config(dir: &Path, pairs: &[&str]) -> Config {
    let mut config: Config = toml::from_str(
        r#"
        [trading]
        pairs = ["BTCUSDT"]
        inter_call_delay_ms = 0

        [retry]
        max_attempts = 3
        initial_delay_ms = 1
        max_delay_ms = 2
        "#,
    )
    .unwrap();
    config.trading.pairs = pairs.iter().map(|p| p.to_string()).collect();
    config.state.dir = dir.to_path_buf();
    config
}

/// Exchange whose account, candles and order failures are scripted up front
pub struct ScriptedExchange {
    candles: Mutex<Vec<Candle>>,
    account: Mutex<AccountState>,
    rules: SymbolRules,
    order_errors: Mutex<VecDeque<ExchangeError>>,
    account_errors: Mutex<VecDeque<ExchangeError>>,
    orders: Mutex<Vec<OrderRequest>>,
    leverage_calls: Mutex<Vec<(String, u32)>>,
}

impl ScriptedExchange {
    pub fn new(candles: Vec<Candle>) -> Self {
        Self {
            candles: Mutex::new(candles),
            account: Mutex::new(AccountState::new(dec!(1000), dec!(1000))),
            rules: SymbolRules::fallback("BTCUSDT"),
            order_errors: Mutex::new(VecDeque::new()),
            account_errors: Mutex::new(VecDeque::new()),
            orders: Mutex::new(Vec::new()),
            leverage_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_account(self, account: AccountState) -> Self {
        Self {
            account: Mutex::new(account),
            ..self
        }
    }

    /// Fail the next orders with these errors, in order
    pub async fn fail_orders(&self, errors: impl IntoIterator<Item = ExchangeError>) {
        self.order_errors.lock().await.extend(errors);
    }

    pub async fn fail_account(&self, errors: impl IntoIterator<Item = ExchangeError>) {
        self.account_errors.lock().await.extend(errors);
    }

    pub async fn push_close(&self, close: Decimal) {
        let mut candles = self.candles.lock().await;
        let Some(last) = candles.last().copied() else {
            return;
        };
        candles.push(Candle::new(
            last.timestamp + Interval::FifteenMinutes.duration(),
            last.close,
            close.max(last.close),
            close.min(last.close),
            close,
            last.volume,
        ));
    }

    pub async fn orders(&self) -> Vec<OrderRequest> {
        self.orders.lock().await.clone()
    }

    pub async fn leverage_calls(&self) -> Vec<(String, u32)> {
        self.leverage_calls.lock().await.clone()
    }
}

#[async_trait]
impl MarketData for ScriptedExchange {
    async fn get_candles(
        &self,
        _symbol: &str,
        _interval: Interval,
        limit: u32,
    ) -> Result<Vec<Candle>, ExchangeError> {
        let candles = self.candles.lock().await;
        let skip = candles.len().saturating_sub(limit as usize);
        Ok(candles[skip..].to_vec())
    }

    async fn get_candles_between(
        &self,
        _symbol: &str,
        _interval: Interval,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<Candle>, ExchangeError> {
        let candles = self.candles.lock().await;
        Ok(candles
            .iter()
            .filter(|c| c.timestamp >= start && c.timestamp <= end)
            .take(limit as usize)
            .copied()
            .collect())
    }

    async fn symbol_rules(&self, symbol: &str) -> Result<SymbolRules, ExchangeError> {
        Ok(SymbolRules {
            symbol: symbol.to_string(),
            ..self.rules.clone()
        })
    }
}

#[async_trait]
impl Exchange for ScriptedExchange {
    async fn get_account(&self) -> Result<AccountState, ExchangeError> {
        if let Some(e) = self.account_errors.lock().await.pop_front() {
            return Err(e);
        }
        Ok(self.account.lock().await.clone())
    }

    async fn set_leverage(&self, symbol: &str, leverage: u32) -> Result<(), ExchangeError> {
        self.leverage_calls
            .lock()
            .await
            .push((symbol.to_string(), leverage));
        self.account
            .lock()
            .await
            .leverage_by_symbol
            .insert(symbol.to_string(), leverage);
        Ok(())
    }

    async fn place_market_order(&self, order: OrderRequest) -> Result<OrderFill, ExchangeError> {
        self.orders.lock().await.push(order.clone());
        if let Some(e) = self.order_errors.lock().await.pop_front() {
            return Err(e);
        }
        let price = self
            .candles
            .lock()
            .await
            .last()
            .map(|c| c.close)
            .unwrap_or_default();
        Ok(OrderFill {
            order_id: format!("scripted-{}", self.orders.lock().await.len()),
            symbol: order.symbol,
            side: order.side,
            quantity: order.quantity,
            price,
            timestamp: Utc::now(),
        })
    }
}
