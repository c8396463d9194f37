//! Position sizing and leverage search
//!
//! Exchange lot-size and minimum-notional constraints are discrete, so a
//! fixed-leverage order frequently undershoots the minimum. The solver
//! starts at the account's current leverage and steps upward until an order
//! fits, or fails closed at the ceiling.

use rust_decimal::Decimal;
use serde::Serialize;

use super::SizingError;
use crate::config::{SizingConfig, MAX_EXCHANGE_LEVERAGE};
use crate::exchange::{AccountState, SymbolRules};

/// Accepted order size
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SizingProposal {
    pub symbol: String,
    /// Quantity, a multiple of the lot step
    pub quantity: Decimal,
    pub leverage: u32,
    pub notional: Decimal,
    pub required_margin: Decimal,
    /// Capital budget the quantity was derived from
    pub budget: Decimal,
    /// Exchange leverage must be updated before placing the order
    pub leverage_changed: bool,
}

/// Round down to a multiple of `step`
pub fn floor_to_step(value: Decimal, step: Decimal) -> Decimal {
    if step <= Decimal::ZERO {
        return value;
    }
    ((value / step).floor() * step).normalize()
}

/// Stepped leverage search
#[derive(Debug, Clone)]
pub struct LeverageSolver {
    config: SizingConfig,
}

impl LeverageSolver {
    pub fn new(config: SizingConfig) -> Self {
        Self { config }
    }

    /// Capital committed to one order
    pub fn budget(&self, available: Decimal) -> Decimal {
        let fraction = if available < self.config.min_balance_threshold {
            self.config.small_account_fraction
        } else {
            self.config.position_size_buffer
        };
        available * fraction
    }

    /// Leverage ceiling for a symbol
    pub fn ceiling(&self, rules: &SymbolRules) -> u32 {
        self.config
            .max_leverage
            .min(rules.max_leverage)
            .min(MAX_EXCHANGE_LEVERAGE)
            .max(1)
    }

    /// Candidate leverages in search order: the current leverage, then
    /// successive multiples of the step, then the ceiling.
    pub fn candidates(&self, current: u32, ceiling: u32) -> Vec<u32> {
        let current = current.clamp(1, ceiling);
        let step = self.config.leverage_step.max(1);

        let mut out = vec![current];
        let mut next = (current / step + 1) * step;
        while next < ceiling {
            out.push(next);
            next += step;
        }
        if ceiling > current {
            out.push(ceiling);
        }
        out
    }

    /// Find the smallest feasible leverage, starting from the account's
    /// current leverage for the symbol.
    pub fn solve(
        &self,
        price: Decimal,
        account: &AccountState,
        rules: &SymbolRules,
    ) -> Result<SizingProposal, SizingError> {
        if price <= Decimal::ZERO {
            return Err(SizingError::InvalidInput("price must be positive"));
        }
        if rules.step_size <= Decimal::ZERO {
            return Err(SizingError::InvalidInput("lot step must be positive"));
        }
        let available = account.available_balance;
        if available <= Decimal::ZERO {
            return Err(SizingError::InvalidInput("no available balance"));
        }

        let budget = self.budget(available);
        let min_notional = self.config.min_notional.max(rules.min_notional);
        let ceiling = self.ceiling(rules);
        let configured = account.leverage_for(&rules.symbol);
        let current = configured.unwrap_or(self.config.default_leverage);

        let mut best_notional = Decimal::ZERO;
        for leverage in self.candidates(current, ceiling) {
            let lev = Decimal::from(leverage);
            let quantity = floor_to_step(budget * lev / price, rules.step_size);
            let notional = quantity * price;
            let required_margin = notional / lev;
            best_notional = best_notional.max(notional);

            tracing::trace!(
                symbol = %rules.symbol,
                leverage,
                %quantity,
                %notional,
                %required_margin,
                "Sizing candidate"
            );

            if quantity > Decimal::ZERO
                && quantity >= rules.min_qty
                && notional >= min_notional
                && required_margin <= available
            {
                return Ok(SizingProposal {
                    symbol: rules.symbol.clone(),
                    quantity,
                    leverage,
                    notional,
                    required_margin,
                    budget,
                    leverage_changed: configured != Some(leverage),
                });
            }
        }

        Err(SizingError::Infeasible {
            symbol: rules.symbol.clone(),
            ceiling,
            best_notional,
            min_notional,
        })
    }
}

impl Default for LeverageSolver {
    fn default() -> Self {
        Self::new(SizingConfig::default())
    }
}
