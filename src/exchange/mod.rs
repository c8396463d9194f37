//! Exchange module
//!
//! Market data and order placement behind async traits, with a Binance
//! USDⓈ-M futures REST client, a paper exchange that simulates fills
//! against live prices, and a retry wrapper for transient failures.

mod binance;
mod error;
mod memory;
mod paper;
mod retry;
mod types;

pub use binance::{BinanceCredentials, BinanceFuturesClient};
pub use error::ExchangeError;
pub use memory::InMemoryMarket;
pub use paper::{PaperExchange, PaperPosition};
pub use retry::RetryPolicy;
pub use types::{AccountState, OrderFill, OrderId, OrderSide, SymbolRules};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::feed::{Candle, Interval};

/// A market order to submit
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: Decimal,
    /// Only reduce an existing position
    pub reduce_only: bool,
}

impl OrderRequest {
    pub fn open(symbol: impl Into<String>, side: OrderSide, quantity: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            quantity,
            reduce_only: false,
        }
    }

    pub fn close(symbol: impl Into<String>, side: OrderSide, quantity: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            quantity,
            reduce_only: true,
        }
    }
}

/// Read-only market data
#[async_trait]
pub trait MarketData: Send + Sync {
    /// Most recent `limit` candles, oldest first
    async fn get_candles(
        &self,
        symbol: &str,
        interval: Interval,
        limit: u32,
    ) -> Result<Vec<Candle>, ExchangeError>;

    /// Up to `limit` candles opening in `[start, end]`, oldest first
    async fn get_candles_between(
        &self,
        symbol: &str,
        interval: Interval,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<Candle>, ExchangeError>;

    /// Lot step, minimum quantity/notional and leverage ceiling
    async fn symbol_rules(&self, symbol: &str) -> Result<SymbolRules, ExchangeError>;
}

/// Account access and order placement
#[async_trait]
pub trait Exchange: MarketData {
    async fn get_account(&self) -> Result<AccountState, ExchangeError>;

    async fn set_leverage(&self, symbol: &str, leverage: u32) -> Result<(), ExchangeError>;

    async fn place_market_order(&self, order: OrderRequest) -> Result<OrderFill, ExchangeError>;
}
