//! Exchange-facing types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Order identifier
pub type OrderId = String;

/// Market order side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Balances and leverage settings, refreshed before every sizing decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountState {
    pub total_balance: Decimal,
    pub available_balance: Decimal,
    /// Leverage currently configured on the exchange, per symbol
    pub leverage_by_symbol: BTreeMap<String, u32>,
    /// Whether the API key may trade
    pub can_trade: bool,
}

impl AccountState {
    pub fn new(total_balance: Decimal, available_balance: Decimal) -> Self {
        Self {
            total_balance,
            available_balance,
            leverage_by_symbol: BTreeMap::new(),
            can_trade: true,
        }
    }

    pub fn with_leverage(mut self, symbol: impl Into<String>, leverage: u32) -> Self {
        self.leverage_by_symbol.insert(symbol.into(), leverage);
        self
    }

    pub fn leverage_for(&self, symbol: &str) -> Option<u32> {
        self.leverage_by_symbol.get(symbol).copied()
    }
}

/// Per-symbol trading constraints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolRules {
    pub symbol: String,
    /// Lot step; quantities are multiples of it
    pub step_size: Decimal,
    pub min_qty: Decimal,
    /// Exchange minimum notional (quantity x price)
    pub min_notional: Decimal,
    pub max_leverage: u32,
}

impl SymbolRules {
    /// Conservative rules used when the exchange does not report any
    pub fn fallback(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            step_size: dec!(0.001),
            min_qty: dec!(0.001),
            min_notional: dec!(5),
            max_leverage: 20,
        }
    }
}

/// A filled market order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderFill {
    pub order_id: OrderId,
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: Decimal,
    /// Average fill price
    pub price: Decimal,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_leverage_lookup() {
        let account = AccountState::new(dec!(1000), dec!(800)).with_leverage("BTCUSDT", 10);
        assert_eq!(account.leverage_for("BTCUSDT"), Some(10));
        assert_eq!(account.leverage_for("ETHUSDT"), None);
        assert!(account.can_trade);
    }

    #[test]
    fn test_order_side_wire_format() {
        assert_eq!(OrderSide::Buy.as_str(), "BUY");
        assert_eq!(serde_json::to_string(&OrderSide::Sell).unwrap(), "\"SELL\"");
    }
}
