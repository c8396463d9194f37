//! Backtest analytics and reporting

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, MathematicalOps};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::Ledger;
use crate::risk::Trade;

const PRECISION: u32 = 8;

/// Per-attribution statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyStats {
    /// Priority strategy name or `regular_consensus`
    pub strategy: String,
    /// Positions opened on its signal
    pub signals: usize,
    pub wins: usize,
    pub win_rate: Decimal,
    pub pnl: Decimal,
}

/// Complete backtest results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub symbol: String,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    /// Candles in the replayed series
    pub candles: usize,
    /// Candles the decision engine was evaluated on
    pub evaluated: usize,
    pub initial_balance: Decimal,
    pub final_balance: Decimal,
    pub total_pnl: Decimal,
    /// Fractional return on the initial balance
    pub total_return: Decimal,
    pub total_trades: usize,
    pub wins: usize,
    pub losses: usize,
    pub win_rate: Decimal,
    pub avg_win: Decimal,
    pub avg_loss: Decimal,
    /// |avg win / avg loss|; `None` when no trade lost
    pub profit_factor: Option<Decimal>,
    /// Peak-to-trough fraction
    pub max_drawdown: Decimal,
    pub sharpe_ratio: Decimal,
    /// Times the daily circuit breaker tripped during the replay
    pub circuit_breaker_trips: u32,
    pub strategies: Vec<StrategyStats>,
    pub balance_samples: Vec<Decimal>,
    pub trades: Vec<Trade>,
}

fn fraction(num: usize, den: usize) -> Decimal {
    if den == 0 {
        return Decimal::ZERO;
    }
    (Decimal::from(num) / Decimal::from(den)).round_dp(PRECISION)
}

fn mean(values: &[Decimal]) -> Decimal {
    if values.is_empty() {
        return Decimal::ZERO;
    }
    values.iter().sum::<Decimal>() / Decimal::from(values.len())
}

/// Mean over population standard deviation of period-over-period returns.
/// Zero with fewer than two returns or no dispersion.
pub(crate) fn sharpe_like(series: &[Decimal]) -> Decimal {
    let returns: Vec<Decimal> = series
        .windows(2)
        .filter(|w| !w[0].is_zero())
        .map(|w| (w[1] - w[0]) / w[0])
        .collect();
    if returns.len() < 2 {
        return Decimal::ZERO;
    }

    let avg = mean(&returns);
    let variance = returns
        .iter()
        .map(|r| (*r - avg) * (*r - avg))
        .sum::<Decimal>()
        / Decimal::from(returns.len());
    match variance.sqrt() {
        Some(std) if !std.is_zero() => (avg / std).round_dp(PRECISION),
        _ => Decimal::ZERO,
    }
}

fn strategy_stats(trades: &[Trade]) -> Vec<StrategyStats> {
    let mut by_label: BTreeMap<&str, (usize, usize, Decimal)> = BTreeMap::new();
    for trade in trades {
        let entry = by_label.entry(&trade.strategy).or_default();
        entry.0 += 1;
        if trade.is_win() {
            entry.1 += 1;
        }
        entry.2 += trade.pnl;
    }

    by_label
        .into_iter()
        .map(|(strategy, (signals, wins, pnl))| StrategyStats {
            strategy: strategy.to_string(),
            signals,
            wins,
            win_rate: fraction(wins, signals),
            pnl,
        })
        .collect()
}

impl BacktestResult {
    /// Derive statistics from a finished ledger
    pub fn from_ledger(
        symbol: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        candles: usize,
        evaluated: usize,
        circuit_breaker_trips: u32,
        ledger: Ledger,
    ) -> Self {
        let initial_balance = ledger.initial_balance();
        let final_balance = ledger.balance();
        let max_drawdown = ledger.max_drawdown().round_dp(PRECISION);
        let (trades, samples) = ledger.into_parts();

        let wins: Vec<Decimal> = trades.iter().filter(|t| t.is_win()).map(|t| t.pnl).collect();
        let losses = trades.len() - wins.len();
        // breakeven trades are losses by count only
        let negative: Vec<Decimal> = trades
            .iter()
            .filter(|t| t.pnl < Decimal::ZERO)
            .map(|t| t.pnl)
            .collect();
        let avg_win = mean(&wins).round_dp(PRECISION);
        let avg_loss = mean(&negative).round_dp(PRECISION);

        let profit_factor = if trades.is_empty() {
            Some(Decimal::ZERO)
        } else if avg_loss.is_zero() {
            None
        } else {
            Some((avg_win / avg_loss).abs().round_dp(PRECISION))
        };

        let mut series = samples.clone();
        series.push(final_balance);

        let total_pnl = final_balance - initial_balance;
        let total_return = if initial_balance.is_zero() {
            Decimal::ZERO
        } else {
            (total_pnl / initial_balance).round_dp(PRECISION)
        };

        Self {
            symbol: symbol.to_string(),
            start,
            end,
            candles,
            evaluated,
            initial_balance,
            final_balance,
            total_pnl,
            total_return,
            total_trades: trades.len(),
            wins: wins.len(),
            losses,
            win_rate: fraction(wins.len(), trades.len()),
            avg_win,
            avg_loss,
            profit_factor,
            max_drawdown,
            sharpe_ratio: sharpe_like(&series),
            circuit_breaker_trips,
            strategies: strategy_stats(&trades),
            balance_samples: samples,
            trades,
        }
    }

    /// Format as table for CLI output
    pub fn format_table(&self) -> String {
        let profit_factor = self
            .profit_factor
            .map_or_else(|| "inf".to_string(), |pf| format!("{pf:.2}"));

        let mut out = format!(
            r#"
══════════════════════════════════════════════════════
               BACKTEST RESULTS: {}
══════════════════════════════════════════════════════

PERFORMANCE
───────────────────────────────────────────────────────
Final Balance:    {:.2} (start {:.2})
Net P&L:          {:+.2} ({:+.2}%)
Sharpe Ratio:     {:.4}
Max Drawdown:     {:.2}%
Win Rate:         {:.1}%
Avg Win / Loss:   {:+.2} / {:+.2}
Profit Factor:    {}

ACTIVITY
───────────────────────────────────────────────────────
Candles:          {} ({} evaluated)
Total Trades:     {} ({} won, {} lost)
Breaker Trips:    {}
"#,
            self.symbol,
            self.final_balance,
            self.initial_balance,
            self.total_pnl,
            self.total_return * dec!(100),
            self.sharpe_ratio,
            self.max_drawdown * dec!(100),
            self.win_rate * dec!(100),
            self.avg_win,
            self.avg_loss,
            profit_factor,
            self.candles,
            self.evaluated,
            self.total_trades,
            self.wins,
            self.losses,
            self.circuit_breaker_trips,
        );

        if !self.strategies.is_empty() {
            out.push_str(
                "\nSTRATEGIES\n───────────────────────────────────────────────────────\n",
            );
            for s in &self.strategies {
                out.push_str(&format!(
                    "{:<24}{:>5} trades {:>6.1}% win {:>+12.2}\n",
                    s.strategy,
                    s.signals,
                    s.win_rate * dec!(100),
                    s.pnl
                ));
            }
        }
        out.push_str("══════════════════════════════════════════════════════\n");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::{ExitReason, Side};
    use chrono::TimeZone;

    fn trade(strategy: &str, pnl: Decimal) -> Trade {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Trade {
            symbol: "BTCUSDT".into(),
            side: Side::Long,
            entry_price: dec!(100),
            exit_price: dec!(100),
            quantity: dec!(1),
            pnl,
            opened_at: at,
            closed_at: at,
            strategy: strategy.into(),
            exit_reason: ExitReason::OppositeSignal,
        }
    }

    fn result_for(trades: Vec<Trade>) -> BacktestResult {
        let mut ledger = Ledger::new(dec!(1000));
        for t in trades {
            ledger.apply(t);
        }
        BacktestResult::from_ledger("BTCUSDT", None, None, 0, 0, 0, ledger)
    }

    #[test]
    fn test_empty_result() {
        let result = result_for(vec![]);
        assert_eq!(result.total_trades, 0);
        assert_eq!(result.win_rate, Decimal::ZERO);
        assert_eq!(result.profit_factor, Some(Decimal::ZERO));
        assert_eq!(result.sharpe_ratio, Decimal::ZERO);
        assert_eq!(result.final_balance, dec!(1000));
    }

    #[test]
    fn test_profit_factor_infinite_without_losses() {
        let result = result_for(vec![trade("emergency", dec!(10)), trade("emergency", dec!(20))]);
        assert_eq!(result.profit_factor, None);
        assert_eq!(result.win_rate, dec!(1));
        assert!(result.format_table().contains("Profit Factor:    inf"));
    }

    #[test]
    fn test_win_loss_statistics() {
        let result = result_for(vec![
            trade("regular_consensus", dec!(30)),
            trade("regular_consensus", dec!(-10)),
            trade("breakout", dec!(10)),
            trade("regular_consensus", dec!(-20)),
        ]);

        assert_eq!(result.wins, 2);
        assert_eq!(result.losses, 2);
        assert_eq!(result.win_rate, dec!(0.5));
        assert_eq!(result.avg_win, dec!(20));
        assert_eq!(result.avg_loss, dec!(-15));
        assert_eq!(result.profit_factor, Some(dec!(1.33333333)));
        assert_eq!(result.total_pnl, dec!(10));
        assert_eq!(result.total_return, dec!(0.01));

        let consensus = result
            .strategies
            .iter()
            .find(|s| s.strategy == "regular_consensus")
            .unwrap();
        assert_eq!(consensus.signals, 3);
        assert_eq!(consensus.wins, 1);
        assert_eq!(consensus.pnl, dec!(0));
    }

    #[test]
    fn test_breakeven_trade_excluded_from_average_loss() {
        let result = result_for(vec![
            trade("regular_consensus", dec!(20)),
            trade("regular_consensus", dec!(-10)),
            trade("regular_consensus", dec!(0)),
        ]);

        assert_eq!(result.wins, 1);
        assert_eq!(result.losses, 2);
        assert_eq!(result.avg_loss, dec!(-10));
        assert_eq!(result.profit_factor, Some(dec!(2)));
    }

    #[test]
    fn test_sharpe_like_ratio() {
        assert_eq!(sharpe_like(&[dec!(100), dec!(110)]), Decimal::ZERO);
        assert_eq!(sharpe_like(&[dec!(100), dec!(110), dec!(121)]), Decimal::ZERO);

        // returns +10% and -10%: mean 0
        assert_eq!(sharpe_like(&[dec!(100), dec!(110), dec!(99)]), Decimal::ZERO);

        // returns +10% and 0%: mean 0.05, std 0.05
        assert_eq!(sharpe_like(&[dec!(100), dec!(110), dec!(110)]), dec!(1));
    }

    #[test]
    fn test_result_serializes_infinite_profit_factor_as_null() {
        let result = result_for(vec![trade("emergency", dec!(10))]);
        let json = serde_json::to_value(&result).unwrap();
        assert!(json["profit_factor"].is_null());
    }
}
