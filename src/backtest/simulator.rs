//! Backtest simulator engine

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use std::borrow::Cow;

use super::{BacktestResult, Ledger};
use crate::config::{BacktestConfig, Config, RiskConfig};
use crate::consensus::DecisionEngine;
use crate::feed::{is_normalized, normalize_candles, Candle};
use crate::indicators::MIN_WINDOW;
use crate::risk::{ExitReason, Position, RiskGovernor, Side, Trade};

/// Open simulated position and the candle index it was opened on
struct Open {
    position: Position,
    index: usize,
}

/// Deterministic single-pass replay of one symbol
pub struct BacktestSimulator {
    engine: DecisionEngine,
    config: BacktestConfig,
    risk: Option<RiskConfig>,
}

impl BacktestSimulator {
    pub fn new(engine: DecisionEngine, config: BacktestConfig) -> Self {
        Self {
            engine,
            config,
            risk: None,
        }
    }

    /// Engine, replay settings and, when `backtest.apply_risk_limits` is set,
    /// the daily circuit breaker from the full configuration
    pub fn from_config(config: &Config) -> Self {
        let sim = Self::new(DecisionEngine::from_config(config), config.backtest.clone());
        if config.backtest.apply_risk_limits {
            sim.with_risk_limits(config.risk.clone())
        } else {
            sim
        }
    }

    /// Route simulated trades through a [`RiskGovernor`]; its initial
    /// balance is the replay's starting balance
    pub fn with_risk_limits(mut self, mut risk: RiskConfig) -> Self {
        risk.initial_balance = self.config.initial_balance;
        self.risk = Some(risk);
        self
    }

    pub fn engine(&self) -> &DecisionEngine {
        &self.engine
    }

    /// First candle index evaluated
    pub fn start_index(&self) -> usize {
        self.config.warmup.max(MIN_WINDOW)
    }

    /// Replay `candles` and derive statistics
    pub fn run(&self, symbol: &str, candles: &[Candle]) -> BacktestResult {
        let candles: Cow<'_, [Candle]> = if is_normalized(candles) {
            Cow::Borrowed(candles)
        } else {
            tracing::warn!(symbol, "Unsorted or duplicate candles, normalizing");
            Cow::Owned(normalize_candles(candles.to_vec()))
        };

        let mut ledger = Ledger::new(self.config.initial_balance);
        let mut governor = match (&self.risk, candles.first()) {
            (Some(risk), Some(first)) => Some(RiskGovernor::new(risk, first.timestamp.date_naive())),
            _ => None,
        };
        let mut open: Option<Open> = None;
        let mut trips = 0u32;
        let mut evaluated = 0usize;

        let start = self.start_index();
        let sample_every = self.config.sample_every.max(1);

        tracing::info!(
            symbol,
            candles = candles.len(),
            start,
            holding = self.config.holding_candles,
            "Starting replay"
        );

        for i in start..candles.len() {
            let candle = &candles[i];
            let Some(eval) = self.engine.evaluate(&candles[..=i]) else {
                tracing::warn!(symbol, index = i, "Evaluation failed, skipping candle");
                continue;
            };
            evaluated += 1;

            let price = candle.close;
            let day = candle.timestamp.date_naive();
            let direction = eval.decision.direction;

            if let Some(current) = open.take() {
                let held = i - current.index;
                let reason = if direction == current.position.side.direction().opposite() {
                    Some(ExitReason::OppositeSignal)
                } else if held >= self.config.holding_candles {
                    Some(ExitReason::HoldingHorizon)
                } else {
                    None
                };

                match reason {
                    Some(reason) => {
                        let trade = current.position.close(price, candle.timestamp, reason);
                        if let Some(gov) = governor.as_mut() {
                            if let Some(trip) = gov.record_close(trade.pnl, day) {
                                tracing::warn!(symbol, %trip, "Circuit breaker tripped in replay");
                                trips += 1;
                            }
                        }
                        book(symbol, &mut ledger, trade);
                    }
                    None => open = Some(current),
                }
            } else if let Some(side) = Side::from_direction(direction) {
                let allowed = match governor.as_mut() {
                    Some(gov) => gov.check_open(day).is_ok(),
                    None => true,
                };
                if allowed {
                    let label = eval.decision.attribution.label();
                    let balance = ledger.balance();
                    if let Some(position) =
                        self.open_position(symbol, side, price, balance, candle.timestamp, label)
                    {
                        if let Some(trip) = governor.as_mut().and_then(|gov| gov.record_open(day)) {
                            tracing::warn!(symbol, %trip, "Circuit breaker tripped in replay");
                            trips += 1;
                        }
                        open = Some(Open { position, index: i });
                    }
                }
            }

            if (i - start) % sample_every == 0 {
                ledger.sample();
            }
        }

        if let (Some(current), Some(last)) = (open, candles.last()) {
            let trade = current
                .position
                .close(last.close, last.timestamp, ExitReason::EndOfData);
            book(symbol, &mut ledger, trade);
        }

        BacktestResult::from_ledger(
            symbol,
            candles.first().map(|c| c.timestamp),
            candles.last().map(|c| c.timestamp),
            candles.len(),
            evaluated,
            trips,
            ledger,
        )
    }

    fn open_position(
        &self,
        symbol: &str,
        side: Side,
        price: Decimal,
        balance: Decimal,
        at: DateTime<Utc>,
        label: &str,
    ) -> Option<Position> {
        if price <= Decimal::ZERO || balance <= Decimal::ZERO {
            return None;
        }
        let quantity = (balance * self.config.position_fraction / price)
            .round_dp_with_strategy(8, RoundingStrategy::ToZero);
        if quantity.is_zero() {
            return None;
        }

        tracing::debug!(symbol, %side, %price, %quantity, strategy = label, "Simulated open");
        Some(Position {
            symbol: symbol.to_string(),
            side,
            entry_price: price,
            quantity,
            leverage: 1,
            opened_at: at,
            strategy: label.to_string(),
            trailing_stop: None,
        })
    }
}

fn book(symbol: &str, ledger: &mut Ledger, trade: Trade) {
    tracing::debug!(
        symbol,
        side = %trade.side,
        pnl = %trade.pnl,
        reason = %trade.exit_reason,
        "Simulated close"
    );
    ledger.apply(trade);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConsensusConfig;
    use crate::indicators::tests::{candles_from, flat_candles};
    use crate::signal::{Direction, SignalContext, Strategy, StrategyRegistry, Tier};
    use rust_decimal_macros::dec;

    /// Votes with the last candle's direction of travel
    struct FollowLastMove;

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

    fn scripted_simulator(config: BacktestConfig) -> BacktestSimulator {
        let engine = DecisionEngine::new(&ConsensusConfig::default(), 150)
            .with_registry(StrategyRegistry::empty().with(FollowLastMove));
        BacktestSimulator::new(engine, config)
    }

    fn rising(n: usize) -> Vec<Candle> {
        let points: Vec<(f64, f64)> = (0..n).map(|i| (100.0 + i as f64, 10.0)).collect();
        candles_from(&points)
    }

    /// Rises by 1 for `up` candles, then falls by `step`
    fn peak_then_fall(up: usize, down: usize, step: f64) -> Vec<Candle> {
        let mut points: Vec<(f64, f64)> = (0..up).map(|i| (100.0 + i as f64, 10.0)).collect();
        let top = 100.0 + up as f64;
        points.extend((0..down).map(|i| (top - step * (i + 1) as f64, 10.0)));
        candles_from(&points)
    }

    #[test]
    fn test_flat_three_candles_yield_no_trades() {
        let sim = BacktestSimulator::new(
            DecisionEngine::new(&ConsensusConfig::default(), 150),
            BacktestConfig::default(),
        );
        let result = sim.run("BTCUSDT", &flat_candles(3));

        assert_eq!(result.total_trades, 0);
        assert_eq!(result.evaluated, 0);
        assert_eq!(result.final_balance, dec!(1000));
    }

    #[test]
    fn test_flat_series_with_standard_registry_trades_nothing() {
        let sim = BacktestSimulator::new(
            DecisionEngine::new(&ConsensusConfig::default(), 150),
            BacktestConfig::default(),
        );
        let result = sim.run("BTCUSDT", &flat_candles(200));

        assert_eq!(result.total_trades, 0);
        assert_eq!(result.evaluated, 100);
        assert_eq!(result.max_drawdown, Decimal::ZERO);
    }

    #[test]
    fn test_holding_horizon_cycles_positions() {
        let sim = scripted_simulator(BacktestConfig::default());
        let result = sim.run("BTCUSDT", &rising(130));

        // opens at 100, 111, 122; closes at 110, 121 and the final candle
        assert_eq!(result.total_trades, 3);
        assert!(result.trades[..2]
            .iter()
            .all(|t| t.exit_reason == ExitReason::HoldingHorizon));
        assert_eq!(result.trades[2].exit_reason, ExitReason::EndOfData);
        assert_eq!(result.wins, 3);
        assert_eq!(result.profit_factor, None);
        assert_eq!(result.strategies.len(), 1);
        assert_eq!(result.strategies[0].strategy, "follow_last_move");
    }

    #[test]
    fn test_opposite_signal_closes_position() {
        let sim = scripted_simulator(BacktestConfig::default());
        let result = sim.run("BTCUSDT", &peak_then_fall(105, 10, 10.0));

        let first = &result.trades[0];
        assert_eq!(first.side, Side::Long);
        assert_eq!(first.exit_reason, ExitReason::OppositeSignal);
        assert!(first.pnl < Decimal::ZERO);

        // the short opened on the next candle profits from the fall
        let second = &result.trades[1];
        assert_eq!(second.side, Side::Short);
        assert!(second.is_win());
    }

    #[test]
    fn test_position_sized_at_fixed_fraction() {
        let sim = scripted_simulator(BacktestConfig::default());
        let candles = rising(105);
        let result = sim.run("BTCUSDT", &candles);

        // 10% of 1000 at the close of candle 100
        let trade = &result.trades[0];
        assert_eq!(trade.entry_price, candles[100].close);
        let expected =
            (dec!(100) / candles[100].close).round_dp_with_strategy(8, RoundingStrategy::ToZero);
        assert_eq!(trade.quantity, expected);
    }

    #[test]
    fn test_replay_is_idempotent() {
        let sim = scripted_simulator(BacktestConfig::default());
        let candles = peak_then_fall(140, 60, 1.0);

        let a = serde_json::to_string(&sim.run("BTCUSDT", &candles)).unwrap();
        let b = serde_json::to_string(&sim.run("BTCUSDT", &candles)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_max_drawdown_bounds_sampled_drops() {
        let config = BacktestConfig {
            sample_every: 1,
            ..BacktestConfig::default()
        };
        let sim = scripted_simulator(config);
        let result = sim.run("BTCUSDT", &peak_then_fall(140, 80, 1.0));

        let mut peak = result.initial_balance;
        for balance in &result.balance_samples {
            peak = peak.max(*balance);
            let drop = (peak - *balance) / peak;
            assert!(result.max_drawdown >= drop.round_dp(8));
        }
    }

    #[test]
    fn test_unsorted_input_is_normalized() {
        let sim = scripted_simulator(BacktestConfig::default());
        let mut candles = rising(130);
        let sorted = sim.run("BTCUSDT", &candles);

        candles.reverse();
        let reversed = sim.run("BTCUSDT", &candles);
        assert_eq!(sorted, reversed);
    }

    #[test]
    fn test_risk_limits_block_opens_after_trade_cap() {
        let risk = RiskConfig {
            max_daily_trades: 1,
            ..RiskConfig::default()
        };
        let sim = scripted_simulator(BacktestConfig::default()).with_risk_limits(risk);
        // every open from index 100 on falls on 2024-01-02
        let result = sim.run("BTCUSDT", &rising(130));

        assert_eq!(result.circuit_breaker_trips, 1);
        assert_eq!(result.total_trades, 1);
    }
}
