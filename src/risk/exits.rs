//! Trailing stop and take profit

use rust_decimal::Decimal;

use super::{ExitReason, Position, Side};
use crate::config::TradingConfig;

/// Price-based exits for open live positions. A percentage of zero
/// disables that exit.
#[derive(Debug, Clone)]
pub struct ExitPolicy {
    pub trailing_stop_pct: Decimal,
    pub take_profit_pct: Decimal,
}

impl ExitPolicy {
    pub fn from_config(config: &TradingConfig) -> Self {
        Self {
            trailing_stop_pct: config.trailing_stop_pct,
            take_profit_pct: config.take_profit_pct,
        }
    }

    /// Stop level for a price, `pct` away on the losing side
    pub fn stop_for(&self, side: Side, price: Decimal) -> Option<Decimal> {
        if self.trailing_stop_pct <= Decimal::ZERO {
            return None;
        }
        let offset = self.trailing_stop_pct / Decimal::ONE_HUNDRED;
        Some(match side {
            Side::Long => price * (Decimal::ONE - offset),
            Side::Short => price * (Decimal::ONE + offset),
        })
    }

    /// Check the exits at `price`, ratcheting the trailing stop in the
    /// favourable direction when no exit fires.
    pub fn check(&self, position: &mut Position, price: Decimal) -> Option<ExitReason> {
        if position.trailing_stop.is_none() {
            position.trailing_stop = self.stop_for(position.side, position.entry_price);
        }

        if let Some(stop) = position.trailing_stop {
            let hit = match position.side {
                Side::Long => price <= stop,
                Side::Short => price >= stop,
            };
            if hit {
                return Some(ExitReason::TrailingStop);
            }
        }

        if self.take_profit_pct > Decimal::ZERO && position.gain_pct(price) >= self.take_profit_pct {
            return Some(ExitReason::TakeProfit);
        }

        if let (Some(stop), Some(candidate)) =
            (position.trailing_stop, self.stop_for(position.side, price))
        {
            let ratcheted = match position.side {
                Side::Long => stop.max(candidate),
                Side::Short => stop.min(candidate),
            };
            if ratcheted != stop {
                tracing::debug!(
                    symbol = %position.symbol,
                    from = %stop,
                    to = %ratcheted,
                    "Trailing stop moved"
                );
            }
            position.trailing_stop = Some(ratcheted);
        }
        None
    }
}
