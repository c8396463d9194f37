//! The polling loop

use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use super::{CycleReport, SkipReason, SymbolOutcome};
use crate::config::{Config, ConfigError};
use crate::consensus::{DecisionEngine, Evaluation};
use crate::exchange::{
    AccountState, Exchange, ExchangeError, MarketData, OrderRequest, RetryPolicy, SymbolRules,
};
use crate::feed::Interval;
use crate::notify::MultiNotifier;
use crate::risk::{
    ExitPolicy, ExitReason, LeverageSolver, Position, PositionBook, RiskError, RiskGovernor,
    Side, SizingError, TripReason,
};
use crate::state::{BotStatus, StatusStore};
use crate::telemetry::{self, GaugeMetric};

const HEARTBEAT_EVERY: Duration = Duration::from_secs(60);

fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

/// Live decision loop over one exchange account
pub struct LiveLoop<E> {
    exchange: E,
    config: Config,
    interval: Interval,
    engine: DecisionEngine,
    solver: LeverageSolver,
    exits: ExitPolicy,
    retry: RetryPolicy,
    governor: RiskGovernor,
    book: PositionBook,
    notifier: MultiNotifier,
    store: StatusStore,
    rules_cache: HashMap<String, SymbolRules>,
    last_heartbeat: Option<Instant>,
    cycles: u64,
}

impl<E: Exchange> LiveLoop<E> {
    /// Build the loop, restoring open positions and, when
    /// `risk.persist_state` is set, the governor snapshot.
    pub fn new(exchange: E, config: Config, notifier: MultiNotifier) -> Result<Self, ConfigError> {
        config.validate()?;
        let interval = config.interval()?;
        let today = Utc::now().date_naive();
        let store = StatusStore::new(&config.state);

        let mut governor = RiskGovernor::new(&config.risk, today);
        if config.risk.persist_state {
            match store.load_risk_state() {
                Ok(Some(state)) => {
                    tracing::info!(
                        day = %state.trading_day,
                        trades = state.daily_trade_count,
                        pnl = %state.daily_realized_pnl,
                        "Restored risk state"
                    );
                    governor = governor.with_state(state);
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(error = %e, "Ignoring unreadable risk state"),
            }
        }

        let book = match store.read_positions() {
            Ok(positions) => {
                if !positions.is_empty() {
                    tracing::info!(count = positions.len(), "Restored open positions");
                }
                PositionBook::with_positions(positions)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring unreadable position file");
                PositionBook::new()
            }
        };

        Ok(Self {
            exchange,
            interval,
            engine: DecisionEngine::from_config(&config),
            solver: LeverageSolver::new(config.sizing.clone()),
            exits: ExitPolicy::from_config(&config.trading),
            retry: RetryPolicy::from_config(&config.retry),
            governor,
            book,
            notifier,
            store,
            rules_cache: HashMap::new(),
            last_heartbeat: None,
            cycles: 0,
            config,
        })
    }

    /// Replace the decision engine, e.g. with a custom strategy registry
    pub fn with_engine(mut self, engine: DecisionEngine) -> Self {
        self.engine = engine;
        self
    }

    pub fn exchange(&self) -> &E {
        &self.exchange
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn book(&self) -> &PositionBook {
        &self.book
    }

    pub fn governor(&self) -> &RiskGovernor {
        &self.governor
    }

    pub fn engine(&self) -> &DecisionEngine {
        &self.engine
    }

    /// Swap trading, sizing, risk, consensus and retry parameters. Takes
    /// effect from the next cycle; open positions, risk counters and the
    /// strategy registry are kept.
    pub fn reload_config(&mut self, config: Config) -> Result<(), ConfigError> {
        config.validate()?;
        self.interval = config.interval()?;
        self.engine
            .reconfigure(&config.consensus, config.trading.candle_limit as usize);
        self.solver = LeverageSolver::new(config.sizing.clone());
        self.exits = ExitPolicy::from_config(&config.trading);
        self.retry = RetryPolicy::from_config(&config.retry);
        if let Some(reason) = self.governor.update_limits(&config.risk) {
            tracing::warn!(%reason, "New risk limits already breached, new positions blocked");
        }
        self.config = config;

        tracing::info!(pairs = ?self.config.trading.pairs, "Configuration reloaded");
        Ok(())
    }

    /// Check connectivity and trading permission
    pub async fn verify(&self) -> Result<AccountState, ExchangeError> {
        let exchange = &self.exchange;
        let account = self.retry.run("account", || exchange.get_account()).await?;
        if !account.can_trade {
            return Err(ExchangeError::Permission {
                code: 0,
                message: "trading is not enabled for this account".to_string(),
            });
        }
        record_account(&account);
        Ok(account)
    }

    /// Verify, then run cycles until `shutdown` is cancelled or a fatal
    /// exchange error occurs
    pub async fn run(&mut self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let account = self.verify().await?;
        tracing::info!(
            pairs = ?self.config.trading.pairs,
            interval = %self.interval,
            balance = %account.total_balance,
            available = %account.available_balance,
            "Live loop starting"
        );
        self.notifier
            .notify(&format!(
                "Trading started on {} pairs, balance {}",
                self.config.trading.pairs.len(),
                account.total_balance.round_dp(2)
            ))
            .await;

        let result = loop {
            if shutdown.is_cancelled() {
                break Ok(());
            }
            if let Err(e) = self.run_cycle().await {
                break Err(e);
            }

            let poll = Duration::from_secs(self.config.trading.poll_interval_secs);
            tokio::select! {
                _ = shutdown.cancelled() => break Ok(()),
                _ = sleep(poll) => {}
            }
        };

        self.persist(false);
        match &result {
            Ok(()) => {
                tracing::info!(cycles = self.cycles, "Live loop stopped");
                self.notifier.notify("Trading stopped").await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Live loop aborted");
                self.notifier
                    .notify(&format!("Trading aborted: {e}"))
                    .await;
            }
        }
        result.map_err(anyhow::Error::from)
    }

    /// One pass over every tracked pair. Only fatal exchange errors are
    /// returned; everything else is logged, notified and recorded as a
    /// failed outcome.
    pub async fn run_cycle(&mut self) -> Result<CycleReport, ExchangeError> {
        let started = Instant::now();
        self.cycles += 1;
        self.rules_cache.clear();

        let delay = Duration::from_millis(self.config.trading.inter_call_delay_ms);
        let pairs = self.config.trading.pairs.clone();
        let mut report = CycleReport::default();

        for (i, symbol) in pairs.iter().enumerate() {
            if i > 0 && !delay.is_zero() {
                sleep(delay).await;
            }

            let outcome = match self.process_symbol(symbol).await {
                Ok(outcome) => outcome,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    tracing::warn!(symbol = %symbol, error = %e, "Symbol evaluation failed");
                    self.notifier
                        .notify(&format!("Error on {symbol}: {e}"))
                        .await;
                    SymbolOutcome::Failed(e.to_string())
                }
            };
            report.outcomes.push((symbol.clone(), outcome));
        }

        self.record_gauges();
        telemetry::record_cycle_latency(started.elapsed());
        self.heartbeat();
        Ok(report)
    }

    async fn process_symbol(&mut self, symbol: &str) -> Result<SymbolOutcome, ExchangeError> {
        let exchange = &self.exchange;
        let (interval, limit) = (self.interval, self.config.trading.candle_limit);
        let candles = self
            .retry
            .run("candles", || exchange.get_candles(symbol, interval, limit))
            .await?;

        let Some(eval) = self.engine.evaluate(&candles) else {
            tracing::debug!(symbol, "No candles returned");
            return Ok(SymbolOutcome::NoData);
        };

        tracing::debug!(
            symbol,
            direction = %eval.decision.direction,
            confidence = %eval.decision.confidence,
            buy_score = %eval.decision.buy_score,
            sell_score = %eval.decision.sell_score,
            attribution = eval.decision.attribution.label(),
            price = %eval.price,
            "Decision"
        );

        if self.book.get(symbol).is_some() {
            return self.manage_open(symbol, &eval).await;
        }

        match Side::from_direction(eval.decision.direction) {
            Some(side) => self.open(symbol, side, &eval).await,
            None => Ok(SymbolOutcome::Idle),
        }
    }

    async fn manage_open(
        &mut self,
        symbol: &str,
        eval: &Evaluation,
    ) -> Result<SymbolOutcome, ExchangeError> {
        let exits = &self.exits;
        let Some(position) = self.book.get_mut(symbol) else {
            return Ok(SymbolOutcome::Idle);
        };

        let stop_before = position.trailing_stop;
        let reason = exits.check(position, eval.price).or_else(|| {
            (eval.decision.direction == position.side.direction().opposite())
                .then_some(ExitReason::OppositeSignal)
        });
        let stop_moved = position.trailing_stop != stop_before;

        match reason {
            Some(reason) => self.close(symbol, reason, eval.price).await,
            None => {
                if stop_moved {
                    self.persist(true);
                }
                Ok(SymbolOutcome::Held)
            }
        }
    }

    async fn symbol_rules(&mut self, symbol: &str) -> Result<SymbolRules, ExchangeError> {
        if let Some(rules) = self.rules_cache.get(symbol) {
            return Ok(rules.clone());
        }
        let exchange = &self.exchange;
        let rules = self
            .retry
            .run("symbol_rules", || exchange.symbol_rules(symbol))
            .await?;
        self.rules_cache.insert(symbol.to_string(), rules.clone());
        Ok(rules)
    }

    async fn open(
        &mut self,
        symbol: &str,
        side: Side,
        eval: &Evaluation,
    ) -> Result<SymbolOutcome, ExchangeError> {
        let today = Utc::now().date_naive();
        if let Err(RiskError::CircuitBreakerTripped(reason)) = self.governor.check_open(today) {
            return Ok(self.skip(symbol, SkipReason::CircuitBreaker(reason)));
        }

        let exchange = &self.exchange;
        let account = self.retry.run("account", || exchange.get_account()).await?;
        record_account(&account);
        let rules = self.symbol_rules(symbol).await?;

        let proposal = match self.solver.solve(eval.price, &account, &rules) {
            Ok(proposal) => proposal,
            Err(SizingError::Infeasible {
                ceiling,
                best_notional,
                min_notional,
                ..
            }) => {
                let detail = format!(
                    "best notional {} below minimum {} at {}x",
                    best_notional.round_dp(2),
                    min_notional,
                    ceiling
                );
                self.notifier
                    .notify(&format!("Skipped {side} {symbol}: {detail}"))
                    .await;
                return Ok(self.skip(symbol, SkipReason::Infeasible(detail)));
            }
            Err(SizingError::InvalidInput(detail)) => {
                return Ok(self.skip(symbol, SkipReason::InvalidInput(detail)));
            }
        };

        let exchange = &self.exchange;
        if proposal.leverage_changed {
            let leverage = proposal.leverage;
            self.retry
                .run("set_leverage", || exchange.set_leverage(symbol, leverage))
                .await?;
        }

        let request = OrderRequest::open(symbol, side.entry_order(), proposal.quantity);
        let fill = self
            .retry
            .run_when("order", ExchangeError::is_rate_limit, || {
                exchange.place_market_order(request.clone())
            })
            .await?;
        telemetry::record_order(symbol, fill.side.as_str(), false);

        let entry_price = if fill.price > Decimal::ZERO {
            fill.price
        } else {
            eval.price
        };
        let quantity = if fill.quantity > Decimal::ZERO {
            fill.quantity
        } else {
            proposal.quantity
        };
        let strategy = eval.decision.attribution.label();
        let position = Position {
            symbol: symbol.to_string(),
            side,
            entry_price,
            quantity,
            leverage: proposal.leverage,
            opened_at: fill.timestamp,
            strategy: strategy.to_string(),
            trailing_stop: self.exits.stop_for(side, entry_price),
        };

        tracing::info!(
            symbol,
            %side,
            %quantity,
            price = %entry_price,
            leverage = proposal.leverage,
            notional = %proposal.notional,
            strategy,
            confidence = %eval.decision.confidence,
            "Position opened"
        );
        if let Err(e) = self.book.open(position.clone()) {
            tracing::error!(symbol, error = %e, "Position book rejected a filled order");
        }

        let trip = self.governor.record_open(today);
        self.persist(true);
        self.notifier
            .notify(&format!(
                "Opened {side} {symbol}: {quantity} @ {entry_price} ({}x, {strategy})",
                proposal.leverage
            ))
            .await;
        if let Some(reason) = trip {
            self.notify_trip(&reason).await;
        }

        Ok(SymbolOutcome::Opened(position))
    }

    async fn close(
        &mut self,
        symbol: &str,
        reason: ExitReason,
        price: Decimal,
    ) -> Result<SymbolOutcome, ExchangeError> {
        let Some(position) = self.book.get(symbol) else {
            return Ok(SymbolOutcome::Idle);
        };
        let request = OrderRequest::close(symbol, position.side.exit_order(), position.quantity);

        let exchange = &self.exchange;
        let fill = self
            .retry
            .run_when("order", ExchangeError::is_rate_limit, || {
                exchange.place_market_order(request.clone())
            })
            .await?;
        telemetry::record_order(symbol, fill.side.as_str(), true);

        let exit_price = if fill.price > Decimal::ZERO {
            fill.price
        } else {
            price
        };
        let Some(trade) = self.book.close(symbol, exit_price, fill.timestamp, reason) else {
            return Ok(SymbolOutcome::Idle);
        };

        tracing::info!(
            symbol,
            side = %trade.side,
            entry = %trade.entry_price,
            exit = %trade.exit_price,
            pnl = %trade.pnl,
            %reason,
            "Position closed"
        );

        let trip = self
            .governor
            .record_close(trade.pnl, Utc::now().date_naive());
        if let Err(e) = self.store.append_trade(&trade) {
            tracing::warn!(error = %e, "Failed to append trade history");
        }
        self.persist(true);
        self.notifier
            .notify(&format!(
                "Closed {} {symbol} @ {exit_price} ({reason}), P&L {}",
                trade.side,
                trade.pnl.round_dp(2)
            ))
            .await;
        if let Some(trip) = trip {
            self.notify_trip(&trip).await;
        }

        Ok(SymbolOutcome::Closed(trade))
    }

    fn skip(&self, symbol: &str, reason: SkipReason) -> SymbolOutcome {
        tracing::info!(symbol, %reason, "Open skipped");
        telemetry::record_skip(reason.label());
        SymbolOutcome::Skipped(reason)
    }

    async fn notify_trip(&self, reason: &TripReason) {
        tracing::warn!(%reason, "New positions blocked until the next trading day");
        self.notifier
            .notify(&format!("Circuit breaker tripped: {reason}"))
            .await;
    }

    /// Write status, positions and, when enabled, the risk snapshot
    fn persist(&self, running: bool) {
        let positions: Vec<Position> = self.book.positions().cloned().collect();
        if let Err(e) = self.store.write_positions(&positions) {
            tracing::warn!(error = %e, "Failed to write positions");
        }

        let status = BotStatus {
            running,
            open_positions: positions.len(),
            total_pnl: self.book.realized_pnl(),
            last_update: Utc::now(),
        };
        if let Err(e) = self.store.write_status(&status) {
            tracing::warn!(error = %e, "Failed to write status");
        }

        if self.config.risk.persist_state {
            if let Err(e) = self.store.save_risk_state(self.governor.state()) {
                tracing::warn!(error = %e, "Failed to write risk state");
            }
        }
    }

    fn record_gauges(&self) {
        let state = self.governor.state();
        telemetry::set_gauge(GaugeMetric::DailyPnl, to_f64(state.daily_realized_pnl));
        telemetry::set_gauge(GaugeMetric::DailyTrades, state.daily_trade_count as f64);
        telemetry::set_gauge(GaugeMetric::OpenPositions, self.book.open_count() as f64);
        telemetry::set_gauge(
            GaugeMetric::CircuitBreaker,
            if self.governor.is_tripped() { 1.0 } else { 0.0 },
        );
    }

    fn heartbeat(&mut self) {
        let due = self
            .last_heartbeat
            .map_or(true, |at| at.elapsed() >= HEARTBEAT_EVERY);
        if !due {
            return;
        }
        self.last_heartbeat = Some(Instant::now());

        let state = self.governor.state();
        tracing::info!(
            cycles = self.cycles,
            open_positions = self.book.open_count(),
            daily_pnl = %state.daily_realized_pnl,
            daily_trades = state.daily_trade_count,
            tripped = self.governor.is_tripped(),
            "Heartbeat"
        );
    }
}

fn record_account(account: &AccountState) {
    telemetry::set_gauge(GaugeMetric::Balance, to_f64(account.total_balance));
    telemetry::set_gauge(
        GaugeMetric::AvailableBalance,
        to_f64(account.available_balance),
    );
}
