//! Paper trading exchange with simulated fills

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    AccountState, Exchange, ExchangeError, MarketData, OrderFill, OrderRequest, OrderSide,
    SymbolRules,
};
use crate::config::{ExchangeConfig, MAX_EXCHANGE_LEVERAGE};
use crate::feed::{Candle, Interval};

/// A simulated open position
#[derive(Debug, Clone, PartialEq)]
pub struct PaperPosition {
    pub side: OrderSide,
    pub quantity: Decimal,
    pub entry_price: Decimal,
    pub leverage: u32,
}

impl PaperPosition {
    fn margin(&self) -> Decimal {
        self.quantity * self.entry_price / Decimal::from(self.leverage.max(1))
    }

    fn pnl_at(&self, price: Decimal, quantity: Decimal) -> Decimal {
        match self.side {
            OrderSide::Buy => (price - self.entry_price) * quantity,
            OrderSide::Sell => (self.entry_price - price) * quantity,
        }
    }
}

#[derive(Debug, Default)]
struct PaperBook {
    wallet: Decimal,
    leverage: HashMap<String, u32>,
    positions: HashMap<String, PaperPosition>,
    fills: Vec<OrderFill>,
}

impl PaperBook {
    fn used_margin(&self) -> Decimal {
        self.positions.values().map(PaperPosition::margin).sum()
    }

    fn available(&self) -> Decimal {
        (self.wallet - self.used_margin()).max(Decimal::ZERO)
    }
}

/// Exchange that simulates account and orders over real market data.
///
/// Market orders fill at the close of the latest candle reported by the
/// wrapped [`MarketData`], less a flat taker fee. One-way position mode:
/// a symbol holds at most one position.
pub struct PaperExchange<M> {
    market: M,
    interval: Interval,
    fee_rate: Decimal,
    book: Arc<RwLock<PaperBook>>,
}

impl<M: MarketData> PaperExchange<M> {
    pub fn new(market: M, interval: Interval, balance: Decimal, fee_rate: Decimal) -> Self {
        Self {
            market,
            interval,
            fee_rate,
            book: Arc::new(RwLock::new(PaperBook {
                wallet: balance,
                ..PaperBook::default()
            })),
        }
    }

    pub fn from_config(market: M, interval: Interval, config: &ExchangeConfig) -> Self {
        Self::new(market, interval, config.paper_balance, config.paper_fee_rate)
    }

    pub fn market(&self) -> &M {
        &self.market
    }

    pub async fn fills(&self) -> Vec<OrderFill> {
        self.book.read().await.fills.clone()
    }

    pub async fn position(&self, symbol: &str) -> Option<PaperPosition> {
        self.book.read().await.positions.get(symbol).cloned()
    }

    async fn last_price(&self, symbol: &str) -> Result<Decimal, ExchangeError> {
        let candles = self.market.get_candles(symbol, self.interval, 1).await?;
        candles
            .last()
            .map(|c| c.close)
            .filter(|p| *p > Decimal::ZERO)
            .ok_or_else(|| ExchangeError::Decode(format!("no price available for {symbol}")))
    }
}

#[async_trait]
impl<M: MarketData> MarketData for PaperExchange<M> {
    async fn get_candles(
        &self,
        symbol: &str,
        interval: Interval,
        limit: u32,
    ) -> Result<Vec<Candle>, ExchangeError> {
        self.market.get_candles(symbol, interval, limit).await
    }

    async fn get_candles_between(
        &self,
        symbol: &str,
        interval: Interval,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<Candle>, ExchangeError> {
        self.market
            .get_candles_between(symbol, interval, start, end, limit)
            .await
    }

    async fn symbol_rules(&self, symbol: &str) -> Result<SymbolRules, ExchangeError> {
        self.market.symbol_rules(symbol).await
    }
}

#[async_trait]
impl<M: MarketData> Exchange for PaperExchange<M> {
    async fn get_account(&self) -> Result<AccountState, ExchangeError> {
        let book = self.book.read().await;
        let mut account = AccountState::new(book.wallet, book.available());
        account.leverage_by_symbol = book
            .leverage
            .iter()
            .map(|(s, l)| (s.clone(), *l))
            .collect::<BTreeMap<_, _>>();
        Ok(account)
    }

    async fn set_leverage(&self, symbol: &str, leverage: u32) -> Result<(), ExchangeError> {
        if leverage == 0 || leverage > MAX_EXCHANGE_LEVERAGE {
            return Err(ExchangeError::Rejected {
                code: -4028,
                message: format!("Leverage {leverage} is not valid"),
            });
        }
        self.book
            .write()
            .await
            .leverage
            .insert(symbol.to_string(), leverage);
        tracing::debug!(symbol, leverage, "Paper leverage set");
        Ok(())
    }

    async fn place_market_order(&self, order: OrderRequest) -> Result<OrderFill, ExchangeError> {
        if order.quantity <= Decimal::ZERO {
            return Err(ExchangeError::Rejected {
                code: -4003,
                message: "Quantity less than or equal to zero.".to_string(),
            });
        }

        let price = self.last_price(&order.symbol).await?;
        let mut book = self.book.write().await;

        let quantity = if order.reduce_only {
            let position = book
                .positions
                .get(&order.symbol)
                .filter(|p| p.side != order.side)
                .cloned()
                .ok_or_else(|| ExchangeError::Rejected {
                    code: -2022,
                    message: "ReduceOnly Order is rejected.".to_string(),
                })?;

            let quantity = order.quantity.min(position.quantity);
            let fee = quantity * price * self.fee_rate;
            book.wallet += position.pnl_at(price, quantity) - fee;

            let remaining = position.quantity - quantity;
            if remaining.is_zero() {
                book.positions.remove(&order.symbol);
            } else if let Some(p) = book.positions.get_mut(&order.symbol) {
                p.quantity = remaining;
            }
            quantity
        } else {
            let leverage = book.leverage.get(&order.symbol).copied().unwrap_or(1);
            let existing = book.positions.get(&order.symbol).cloned();
            if existing.as_ref().is_some_and(|p| p.side != order.side) {
                return Err(ExchangeError::Rejected {
                    code: -4061,
                    message: format!("Opposite position open on {}", order.symbol),
                });
            }

            let notional = order.quantity * price;
            let fee = notional * self.fee_rate;
            let margin = notional / Decimal::from(leverage);
            if margin + fee > book.available() {
                return Err(ExchangeError::InsufficientMargin(format!(
                    "margin {} exceeds available {}",
                    margin.round_dp(2),
                    book.available().round_dp(2)
                )));
            }

            book.wallet -= fee;
            let position = match existing {
                Some(p) => {
                    let total = p.quantity + order.quantity;
                    PaperPosition {
                        side: p.side,
                        quantity: total,
                        entry_price: (p.entry_price * p.quantity + notional) / total,
                        leverage,
                    }
                }
                None => PaperPosition {
                    side: order.side,
                    quantity: order.quantity,
                    entry_price: price,
                    leverage,
                },
            };
            book.positions.insert(order.symbol.clone(), position);
            order.quantity
        };

        let fill = OrderFill {
            order_id: Uuid::new_v4().to_string(),
            symbol: order.symbol,
            side: order.side,
            quantity,
            price,
            timestamp: Utc::now(),
        };
        book.fills.push(fill.clone());

        tracing::info!(
            order_id = %fill.order_id,
            symbol = %fill.symbol,
            side = %fill.side,
            quantity = %fill.quantity,
            price = %fill.price,
            reduce_only = order.reduce_only,
            "Paper order filled"
        );
        Ok(fill)
    }
}
