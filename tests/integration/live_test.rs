//! Live loop against the scripted exchange

use consensus_trader::exchange::{AccountState, ExchangeError, OrderSide};
use consensus_trader::live::{LiveLoop, SkipReason, SymbolOutcome};
use consensus_trader::notify::MultiNotifier;
use consensus_trader::risk::{ExitReason, Side};
use consensus_trader::state::StatusStore;
use rust_decimal_macros::dec;
use tempfile::TempDir;
use tokio_test::assert_err;
use tokio_util::sync::CancellationToken;

use crate::support::{follow_engine, rising, test_config, ScriptedExchange};

fn trader(dir: &TempDir, exchange: ScriptedExchange) -> LiveLoop<ScriptedExchange> {
    LiveLoop::new(
        exchange,
        test_config(dir.path(), &["BTCUSDT"]),
        MultiNotifier::new(vec![]),
    )
    .unwrap()
    .with_engine(follow_engine())
}

#[tokio::test]
async fn test_run_refuses_account_without_trading_permission() {
    let dir = TempDir::new().unwrap();
    let mut account = AccountState::new(dec!(1000), dec!(1000));
    account.can_trade = false;
    let mut trader = trader(&dir, ScriptedExchange::new(rising(150)).with_account(account));

    let err = assert_err!(trader.run(CancellationToken::new()).await);
    assert!(matches!(
        err.downcast_ref::<ExchangeError>(),
        Some(ExchangeError::Permission { .. })
    ));
    assert!(trader.exchange().orders().await.is_empty());
}

#[tokio::test]
async fn test_open_sets_leverage_then_places_market_order() {
    let dir = TempDir::new().unwrap();
    let mut trader = trader(&dir, ScriptedExchange::new(rising(150)));

    let report = trader.run_cycle().await.unwrap();
    assert_eq!(report.opened(), 1);

    let exchange = trader.exchange();
    assert_eq!(
        exchange.leverage_calls().await,
        vec![("BTCUSDT".to_string(), 3)]
    );
    let orders = exchange.orders().await;
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].side, OrderSide::Buy);
    assert!(!orders[0].reduce_only);
    assert_eq!(orders[0].quantity, dec!(10.843));
}

#[tokio::test]
async fn test_rate_limited_order_is_retried() {
    let dir = TempDir::new().unwrap();
    let exchange = ScriptedExchange::new(rising(150));
    exchange
        .fail_orders([ExchangeError::RateLimited {
            code: -1003,
            message: "Too many requests".to_string(),
        }])
        .await;
    let mut trader = trader(&dir, exchange);

    let report = trader.run_cycle().await.unwrap();
    assert_eq!(report.opened(), 1);
    assert_eq!(trader.exchange().orders().await.len(), 2);
}

#[tokio::test]
async fn test_timed_out_order_is_not_resubmitted() {
    let dir = TempDir::new().unwrap();
    let exchange = ScriptedExchange::new(rising(150));
    exchange.fail_orders([ExchangeError::Timeout]).await;
    let mut trader = trader(&dir, exchange);

    let report = trader.run_cycle().await.unwrap();
    assert_eq!(report.failed(), 1);
    assert_eq!(trader.exchange().orders().await.len(), 1);
    assert_eq!(trader.book().open_count(), 0);
    assert_eq!(trader.governor().state().daily_trade_count, 0);
}

#[tokio::test]
async fn test_permission_error_mid_cycle_is_fatal() {
    let dir = TempDir::new().unwrap();
    let exchange = ScriptedExchange::new(rising(150));
    exchange
        .fail_account([ExchangeError::Permission {
            code: -2015,
            message: "Invalid API-key".to_string(),
        }])
        .await;
    let mut trader = trader(&dir, exchange);

    let err = assert_err!(trader.run_cycle().await);
    assert!(err.is_fatal());
}

#[tokio::test]
async fn test_small_account_skips_infeasible_open() {
    let dir = TempDir::new().unwrap();
    let exchange =
        ScriptedExchange::new(rising(150)).with_account(AccountState::new(dec!(1), dec!(1)));
    let mut trader = trader(&dir, exchange);

    let report = trader.run_cycle().await.unwrap();
    assert!(matches!(
        report.outcome("BTCUSDT"),
        Some(SymbolOutcome::Skipped(SkipReason::Infeasible(_)))
    ));
    assert!(trader.exchange().orders().await.is_empty());
}

#[tokio::test]
async fn test_opposite_signal_closes_with_reduce_only_order() {
    let dir = TempDir::new().unwrap();
    let mut trader = trader(&dir, ScriptedExchange::new(rising(150)));
    trader.run_cycle().await.unwrap();

    // above the 246.51 stop, but the last move is down
    trader.exchange().push_close(dec!(248)).await;
    let report = trader.run_cycle().await.unwrap();

    let Some(SymbolOutcome::Closed(trade)) = report.outcome("BTCUSDT") else {
        panic!("expected a close, got {:?}", report.outcome("BTCUSDT"));
    };
    assert_eq!(trade.exit_reason, ExitReason::OppositeSignal);
    assert_eq!(trade.side, Side::Long);
    assert_eq!(trade.pnl, dec!(-10.843));

    let orders = trader.exchange().orders().await;
    assert_eq!(orders.len(), 2);
    assert_eq!(orders[1].side, OrderSide::Sell);
    assert!(orders[1].reduce_only);
    assert_eq!(orders[1].quantity, orders[0].quantity);
}

#[tokio::test]
async fn test_take_profit_closes_long() {
    let dir = TempDir::new().unwrap();
    let mut trader = trader(&dir, ScriptedExchange::new(rising(150)));
    trader.run_cycle().await.unwrap();

    trader.exchange().push_close(dec!(254)).await;
    let report = trader.run_cycle().await.unwrap();

    let Some(SymbolOutcome::Closed(trade)) = report.outcome("BTCUSDT") else {
        panic!("expected a close, got {:?}", report.outcome("BTCUSDT"));
    };
    assert_eq!(trade.exit_reason, ExitReason::TakeProfit);
    assert!(trade.pnl > dec!(0));
}

#[tokio::test]
async fn test_restart_restores_open_position() {
    let dir = TempDir::new().unwrap();
    {
        let mut first = trader(&dir, ScriptedExchange::new(rising(150)));
        first.run_cycle().await.unwrap();
        assert_eq!(first.book().open_count(), 1);
    }

    let exchange = ScriptedExchange::new(rising(150));
    exchange.push_close(dec!(250)).await;
    let mut second = trader(&dir, exchange);
    assert_eq!(second.book().open_count(), 1);

    let report = second.run_cycle().await.unwrap();
    assert_eq!(report.outcome("BTCUSDT"), Some(&SymbolOutcome::Held));
    assert!(second.exchange().orders().await.is_empty());

    let position = second.book().get("BTCUSDT").unwrap();
    assert_eq!(position.trailing_stop, Some(dec!(247.5)));
}

#[tokio::test]
async fn test_risk_state_survives_restart_when_enabled() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(dir.path(), &["BTCUSDT"]);
    config.risk.persist_state = true;

    let mut first = LiveLoop::new(
        ScriptedExchange::new(rising(150)),
        config.clone(),
        MultiNotifier::new(vec![]),
    )
    .unwrap()
    .with_engine(follow_engine());
    first.run_cycle().await.unwrap();

    let store = StatusStore::new(&config.state);
    assert_eq!(store.load_risk_state().unwrap().unwrap().daily_trade_count, 1);

    let second = LiveLoop::new(
        ScriptedExchange::new(rising(150)),
        config,
        MultiNotifier::new(vec![]),
    )
    .unwrap();
    assert_eq!(second.governor().state().daily_trade_count, 1);
}
