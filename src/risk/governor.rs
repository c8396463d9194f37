//! Daily circuit breaker
//!
//! Two states: armed (orders allowed) and tripped (new orders blocked).
//! The governor trips when daily realized P&L falls to the loss limit or
//! the daily trade count reaches its maximum, and re-arms only when the
//! calendar day changes. Closing positions is never blocked.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{RiskError, TripReason};
use crate::config::RiskConfig;

/// Account-wide daily risk counters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskState {
    pub daily_realized_pnl: Decimal,
    pub daily_trade_count: u32,
    pub trading_day: NaiveDate,
    /// Set while the circuit breaker is tripped
    pub tripped: Option<TripReason>,
}

impl RiskState {
    pub fn fresh(day: NaiveDate) -> Self {
        Self {
            daily_realized_pnl: Decimal::ZERO,
            daily_trade_count: 0,
            trading_day: day,
            tripped: None,
        }
    }
}

/// Governor state
#[derive(Debug, Clone, PartialEq)]
pub enum GovernorState {
    Armed,
    Tripped(TripReason),
}

/// Daily loss and trade-count circuit breaker
#[derive(Debug, Clone)]
pub struct RiskGovernor {
    initial_balance: Decimal,
    daily_loss_limit: Decimal,
    max_daily_trades: u32,
    state: RiskState,
}

impl RiskGovernor {
    pub fn new(config: &RiskConfig, today: NaiveDate) -> Self {
        Self {
            initial_balance: config.initial_balance,
            daily_loss_limit: config.daily_loss_limit,
            max_daily_trades: config.max_daily_trades,
            state: RiskState::fresh(today),
        }
    }

    /// Resume from a persisted snapshot. A snapshot from an earlier day is
    /// rolled over on the next check.
    pub fn with_state(mut self, state: RiskState) -> Self {
        self.state = state;
        self
    }

    /// Apply new limits, keeping today's counters. Trips immediately when
    /// the counters already breach the new limits; returns that reason.
    pub fn update_limits(&mut self, config: &RiskConfig) -> Option<TripReason> {
        self.initial_balance = config.initial_balance;
        self.daily_loss_limit = config.daily_loss_limit;
        self.max_daily_trades = config.max_daily_trades;
        self.evaluate()
    }

    pub fn state(&self) -> &RiskState {
        &self.state
    }

    pub fn governor_state(&self) -> GovernorState {
        match &self.state.tripped {
            Some(reason) => GovernorState::Tripped(reason.clone()),
            None => GovernorState::Armed,
        }
    }

    pub fn is_tripped(&self) -> bool {
        self.state.tripped.is_some()
    }

    /// Absolute daily loss that trips the breaker
    pub fn loss_limit(&self) -> Decimal {
        self.initial_balance * self.daily_loss_limit
    }

    /// Reset counters when `today` differs from the stored trading day.
    /// Returns whether a rollover happened.
    pub fn roll(&mut self, today: NaiveDate) -> bool {
        if today == self.state.trading_day {
            return false;
        }
        if let Some(reason) = &self.state.tripped {
            tracing::info!(%reason, day = %today, "Day rollover, re-arming circuit breaker");
        }
        self.state = RiskState::fresh(today);
        true
    }

    /// Gate for opening a new position
    pub fn check_open(&mut self, today: NaiveDate) -> Result<(), RiskError> {
        self.roll(today);
        match &self.state.tripped {
            Some(reason) => Err(RiskError::CircuitBreakerTripped(reason.clone())),
            None => Ok(()),
        }
    }

    /// Count a placed opening order. Returns the trip reason if this call
    /// tripped the breaker.
    pub fn record_open(&mut self, today: NaiveDate) -> Option<TripReason> {
        self.roll(today);
        self.state.daily_trade_count += 1;
        self.evaluate()
    }

    /// Book the realized P&L of a closed position. Returns the trip reason
    /// if this call tripped the breaker.
    pub fn record_close(&mut self, pnl: Decimal, today: NaiveDate) -> Option<TripReason> {
        self.roll(today);
        self.state.daily_realized_pnl += pnl;
        self.evaluate()
    }

    fn evaluate(&mut self) -> Option<TripReason> {
        if self.state.tripped.is_some() {
            return None;
        }

        let limit = self.loss_limit();
        let reason = if self.state.daily_realized_pnl <= -limit {
            TripReason::DailyLoss {
                pnl: self.state.daily_realized_pnl,
                limit,
            }
        } else if self.state.daily_trade_count >= self.max_daily_trades {
            TripReason::TradeCount {
                count: self.state.daily_trade_count,
                max: self.max_daily_trades,
            }
        } else {
            return None;
        };

        tracing::warn!(%reason, "Circuit breaker tripped");
        self.state.tripped = Some(reason.clone());
        Some(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn governor() -> RiskGovernor {
        RiskGovernor::new(&RiskConfig::default(), day(1))
    }

    #[test]
    fn test_armed_by_default() {
        let mut g = governor();
        assert_eq!(g.governor_state(), GovernorState::Armed);
        assert!(g.check_open(day(1)).is_ok());
        assert_eq!(g.loss_limit(), dec!(50));
    }

    #[test]
    fn test_trips_on_daily_loss_and_stays_tripped() {
        let mut g = governor();
        assert!(g.record_close(dec!(-30), day(1)).is_none());
        let reason = g.record_close(dec!(-20), day(1)).unwrap();
        assert!(matches!(reason, TripReason::DailyLoss { .. }));
        assert!(g.check_open(day(1)).is_err());

        // A profitable close the same day does not re-arm
        assert!(g.record_close(dec!(500), day(1)).is_none());
        assert!(g.is_tripped());
        assert!(matches!(
            g.check_open(day(1)),
            Err(RiskError::CircuitBreakerTripped(TripReason::DailyLoss { .. }))
        ));
    }

    #[test]
    fn test_trade_count_blocks_next_order() {
        let mut g = governor();
        for _ in 0..29 {
            assert!(g.check_open(day(1)).is_ok());
            g.record_open(day(1));
        }
        assert!(g.check_open(day(1)).is_ok());
        let reason = g.record_open(day(1)).unwrap();
        assert_eq!(reason, TripReason::TradeCount { count: 30, max: 30 });
        assert!(g.check_open(day(1)).is_err());
    }

    #[test]
    fn test_tightened_limits_trip_immediately() {
        let mut g = governor();
        for _ in 0..5 {
            g.record_open(day(1));
        }
        assert!(g.check_open(day(1)).is_ok());

        let tighter = RiskConfig {
            max_daily_trades: 3,
            ..RiskConfig::default()
        };
        assert_eq!(
            g.update_limits(&tighter),
            Some(TripReason::TradeCount { count: 5, max: 3 })
        );
        assert!(matches!(
            g.check_open(day(1)),
            Err(RiskError::CircuitBreakerTripped(TripReason::TradeCount { count: 5, max: 3 }))
        ));
    }

    #[test]
    fn test_tightened_loss_limit_trips_immediately() {
        let mut g = governor();
        assert!(g.record_close(dec!(-30), day(1)).is_none());

        let tighter = RiskConfig {
            daily_loss_limit: dec!(0.02),
            ..RiskConfig::default()
        };
        assert!(matches!(
            g.update_limits(&tighter),
            Some(TripReason::DailyLoss { .. })
        ));
        assert!(g.check_open(day(1)).is_err());
    }

    #[test]
    fn test_rollover_rearms_and_zeroes() {
        let mut g = governor();
        g.record_close(dec!(-100), day(1));
        assert!(g.is_tripped());

        assert!(g.check_open(day(2)).is_ok());
        assert_eq!(g.state().daily_realized_pnl, dec!(0));
        assert_eq!(g.state().daily_trade_count, 0);
        assert_eq!(g.state().trading_day, day(2));
    }

    #[test]
    fn test_restore_stale_snapshot() {
        let mut snapshot = RiskState::fresh(day(1));
        snapshot.daily_trade_count = 30;
        snapshot.tripped = Some(TripReason::TradeCount { count: 30, max: 30 });

        let mut g = governor().with_state(snapshot.clone());
        assert!(g.check_open(day(1)).is_err());

        let mut g = governor().with_state(snapshot);
        assert!(g.check_open(day(2)).is_ok());
    }

    #[test]
    fn test_risk_state_json() {
        let mut state = RiskState::fresh(day(5));
        state.tripped = Some(TripReason::DailyLoss {
            pnl: dec!(-60),
            limit: dec!(50),
        });
        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains("\"kind\":\"daily_loss\""));
        let back: RiskState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }
}
