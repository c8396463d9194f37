//! Simulated account ledger

use rust_decimal::Decimal;

use crate::risk::Trade;

/// Balance, drawdown and trade log of a replay
#[derive(Debug, Clone)]
pub struct Ledger {
    initial_balance: Decimal,
    balance: Decimal,
    peak: Decimal,
    max_drawdown: Decimal,
    samples: Vec<Decimal>,
    trades: Vec<Trade>,
}

impl Ledger {
    pub fn new(initial_balance: Decimal) -> Self {
        Self {
            initial_balance,
            balance: initial_balance,
            peak: initial_balance,
            max_drawdown: Decimal::ZERO,
            samples: vec![],
            trades: vec![],
        }
    }

    pub fn initial_balance(&self) -> Decimal {
        self.initial_balance
    }

    pub fn balance(&self) -> Decimal {
        self.balance
    }

    pub fn peak(&self) -> Decimal {
        self.peak
    }

    /// Largest peak-to-trough fraction seen so far
    pub fn max_drawdown(&self) -> Decimal {
        self.max_drawdown
    }

    pub fn samples(&self) -> &[Decimal] {
        &self.samples
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    /// Book a closed trade
    pub fn apply(&mut self, trade: Trade) {
        self.balance += trade.pnl;
        self.trades.push(trade);
        self.mark();
    }

    /// Record the current balance into the sampled series
    pub fn sample(&mut self) {
        self.samples.push(self.balance);
        self.mark();
    }

    fn mark(&mut self) {
        if self.balance > self.peak {
            self.peak = self.balance;
        }
        if self.peak > Decimal::ZERO {
            let drawdown = (self.peak - self.balance) / self.peak;
            if drawdown > self.max_drawdown {
                self.max_drawdown = drawdown;
            }
        }
    }

    pub fn into_parts(self) -> (Vec<Trade>, Vec<Decimal>) {
        (self.trades, self.samples)
    }
}
