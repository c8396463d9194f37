//! Prometheus metrics

use std::time::Duration;

/// Gauge metric types
#[derive(Debug, Clone, Copy)]
pub enum GaugeMetric {
    /// Total wallet balance
    Balance,
    /// Balance not reserved as margin
    AvailableBalance,
    /// Realized P&L of the current trading day
    DailyPnl,
    /// Opening orders placed today
    DailyTrades,
    /// Open position count
    OpenPositions,
    /// 1 while the circuit breaker is tripped
    CircuitBreaker,
}

impl GaugeMetric {
    pub fn name(&self) -> &'static str {
        match self {
            GaugeMetric::Balance => "trader_balance_usd",
            GaugeMetric::AvailableBalance => "trader_available_balance_usd",
            GaugeMetric::DailyPnl => "trader_daily_pnl_usd",
            GaugeMetric::DailyTrades => "trader_daily_trades",
            GaugeMetric::OpenPositions => "trader_open_positions",
            GaugeMetric::CircuitBreaker => "trader_circuit_breaker_tripped",
        }
    }
}

/// Set a gauge value
pub fn set_gauge(metric: GaugeMetric, value: f64) {
    metrics::gauge!(metric.name()).set(value);
}

/// Time spent on one pass over all trading pairs
pub fn record_cycle_latency(duration: Duration) {
    metrics::histogram!("trader_cycle_latency_ms").record(duration.as_secs_f64() * 1000.0);
}

/// Count a filled order
pub fn record_order(symbol: &str, side: &'static str, reduce_only: bool) {
    let kind = if reduce_only { "close" } else { "open" };
    metrics::counter!(
        "trader_orders_total",
        "symbol" => symbol.to_string(),
        "side" => side,
        "kind" => kind
    )
    .increment(1);
}

/// Count an open that did not happen
pub fn record_skip(reason: &'static str) {
    metrics::counter!("trader_orders_skipped_total", "reason" => reason).increment(1);
}

/// Register metric descriptions with the installed recorder
pub fn describe_metrics() {
    metrics::describe_gauge!(GaugeMetric::Balance.name(), "Total wallet balance");
    metrics::describe_gauge!(
        GaugeMetric::AvailableBalance.name(),
        "Balance not reserved as margin"
    );
    metrics::describe_gauge!(GaugeMetric::DailyPnl.name(), "Realized P&L today");
    metrics::describe_gauge!(GaugeMetric::DailyTrades.name(), "Opening orders today");
    metrics::describe_gauge!(GaugeMetric::OpenPositions.name(), "Open positions");
    metrics::describe_gauge!(
        GaugeMetric::CircuitBreaker.name(),
        "1 while the daily circuit breaker is tripped"
    );
    metrics::describe_histogram!("trader_cycle_latency_ms", "Decision cycle latency");
    metrics::describe_counter!("trader_orders_total", "Filled market orders");
    metrics::describe_counter!("trader_orders_skipped_total", "Opens skipped, by reason");
    metrics::describe_counter!("trader_exchange_retries_total", "Exchange call retries");
}
