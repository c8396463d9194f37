//! Position tracking

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::RiskError;
use crate::exchange::OrderSide;
use crate::signal::Direction;

/// Position side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// Side opened by a decision; `None` for a neutral decision
    pub fn from_direction(direction: Direction) -> Option<Self> {
        match direction {
            Direction::Buy => Some(Side::Long),
            Direction::Sell => Some(Side::Short),
            Direction::Neutral => None,
        }
    }

    pub fn direction(&self) -> Direction {
        match self {
            Side::Long => Direction::Buy,
            Side::Short => Direction::Sell,
        }
    }

    pub fn entry_order(&self) -> OrderSide {
        match self {
            Side::Long => OrderSide::Buy,
            Side::Short => OrderSide::Sell,
        }
    }

    pub fn exit_order(&self) -> OrderSide {
        match self {
            Side::Long => OrderSide::Sell,
            Side::Short => OrderSide::Buy,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Side::Long => "LONG",
            Side::Short => "SHORT",
        })
    }
}

/// Why a position was closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    OppositeSignal,
    HoldingHorizon,
    TrailingStop,
    TakeProfit,
    EndOfData,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExitReason::OppositeSignal => "opposite signal",
            ExitReason::HoldingHorizon => "holding horizon",
            ExitReason::TrailingStop => "trailing stop",
            ExitReason::TakeProfit => "take profit",
            ExitReason::EndOfData => "end of data",
        })
    }
}

/// An open position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub side: Side,
    pub entry_price: Decimal,
    pub quantity: Decimal,
    pub leverage: u32,
    pub opened_at: DateTime<Utc>,
    /// Attribution label of the decision that opened it
    pub strategy: String,
    /// Current trailing stop level, if one is maintained
    pub trailing_stop: Option<Decimal>,
}

impl Position {
    /// Profit or loss if closed at `price`
    pub fn pnl_at(&self, price: Decimal) -> Decimal {
        match self.side {
            Side::Long => (price - self.entry_price) * self.quantity,
            Side::Short => (self.entry_price - price) * self.quantity,
        }
    }

    /// Favourable move from entry, in percent
    pub fn gain_pct(&self, price: Decimal) -> Decimal {
        if self.entry_price.is_zero() {
            return Decimal::ZERO;
        }
        let raw = (price - self.entry_price) / self.entry_price * Decimal::ONE_HUNDRED;
        match self.side {
            Side::Long => raw,
            Side::Short => -raw,
        }
    }

    /// Turn into a closed trade record
    pub fn close(self, exit_price: Decimal, closed_at: DateTime<Utc>, reason: ExitReason) -> Trade {
        Trade {
            pnl: self.pnl_at(exit_price),
            symbol: self.symbol,
            side: self.side,
            entry_price: self.entry_price,
            exit_price,
            quantity: self.quantity,
            opened_at: self.opened_at,
            closed_at,
            strategy: self.strategy,
            exit_reason: reason,
        }
    }
}

/// A closed trade, append-only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub symbol: String,
    pub side: Side,
    pub entry_price: Decimal,
    pub exit_price: Decimal,
    pub quantity: Decimal,
    pub pnl: Decimal,
    pub opened_at: DateTime<Utc>,
    pub closed_at: DateTime<Utc>,
    pub strategy: String,
    pub exit_reason: ExitReason,
}

impl Trade {
    pub fn is_win(&self) -> bool {
        self.pnl > Decimal::ZERO
    }
}

/// Open positions, at most one per symbol
#[derive(Debug, Clone, Default)]
pub struct PositionBook {
    open: BTreeMap<String, Position>,
    realized_pnl: Decimal,
    closed_count: usize,
}

impl PositionBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore previously persisted open positions
    pub fn with_positions(positions: impl IntoIterator<Item = Position>) -> Self {
        let mut book = Self::new();
        for p in positions {
            book.open.insert(p.symbol.clone(), p);
        }
        book
    }

    pub fn open(&mut self, position: Position) -> Result<(), RiskError> {
        if self.open.contains_key(&position.symbol) {
            return Err(RiskError::PositionExists(position.symbol));
        }
        self.open.insert(position.symbol.clone(), position);
        Ok(())
    }

    pub fn close(
        &mut self,
        symbol: &str,
        exit_price: Decimal,
        closed_at: DateTime<Utc>,
        reason: ExitReason,
    ) -> Option<Trade> {
        let trade = self.open.remove(symbol)?.close(exit_price, closed_at, reason);
        self.realized_pnl += trade.pnl;
        self.closed_count += 1;
        Some(trade)
    }

    pub fn get(&self, symbol: &str) -> Option<&Position> {
        self.open.get(symbol)
    }

    pub fn get_mut(&mut self, symbol: &str) -> Option<&mut Position> {
        self.open.get_mut(symbol)
    }

    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.open.values()
    }

    pub fn open_count(&self) -> usize {
        self.open.len()
    }

    pub fn closed_count(&self) -> usize {
        self.closed_count
    }

    /// Realized P&L since the book was created
    pub fn realized_pnl(&self) -> Decimal {
        self.realized_pnl
    }
}
