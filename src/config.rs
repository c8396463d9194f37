//! Configuration types for consensus-trader

use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;

use crate::feed::Interval;

/// Highest leverage any supported futures exchange accepts
pub const MAX_EXCHANGE_LEVERAGE: u32 = 125;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub exchange: ExchangeConfig,
    pub trading: TradingConfig,
    #[serde(default)]
    pub sizing: SizingConfig,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub consensus: ConsensusConfig,
    #[serde(default)]
    pub backtest: BacktestConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub state: StateConfig,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Configuration validation errors
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("trading.pairs must list at least one symbol")]
    NoTradingPairs,
    #[error("sizing.max_leverage must be between 1 and 125, got {0}")]
    LeverageCeiling(u32),
    #[error("sizing.leverage_step must be at least 1")]
    LeverageStep,
    #[error("{field} must be in (0, 1], got {value}")]
    FractionOutOfRange { field: &'static str, value: Decimal },
    #[error("backtest.holding_candles must be at least 1")]
    HoldingHorizon,
    #[error("state.history_cap must be at least 1")]
    HistoryCap,
    #[error("risk.max_daily_trades must be at least 1")]
    MaxDailyTrades,
    #[error("trading.interval {0:?} is not a supported candle interval")]
    InvalidInterval(String),
    #[error("data.page_size must be between 1 and 1000, got {0}")]
    PageSize(u32),
}

/// Exchange connectivity configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeConfig {
    /// Execution mode: paper or live
    #[serde(default)]
    pub mode: ExecutionMode,
    /// REST base URL of the futures API
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Signed request receive window in milliseconds
    #[serde(default = "default_recv_window_ms")]
    pub recv_window_ms: u64,
    /// Starting balance of the paper account
    #[serde(default = "default_paper_balance")]
    pub paper_balance: Decimal,
    /// Taker fee charged on paper fills
    #[serde(default = "default_paper_fee_rate")]
    pub paper_fee_rate: Decimal,
}

/// Execution mode: paper trading or live
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    #[default]
    Paper,
    Live,
}

fn default_base_url() -> String {
    "https://fapi.binance.com".to_string()
}
fn default_timeout_secs() -> u64 {
    10
}
fn default_recv_window_ms() -> u64 {
    5000
}
fn default_paper_balance() -> Decimal {
    Decimal::new(1000, 0)
}
fn default_paper_fee_rate() -> Decimal {
    Decimal::new(4, 4)
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::Paper,
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            recv_window_ms: default_recv_window_ms(),
            paper_balance: default_paper_balance(),
            paper_fee_rate: default_paper_fee_rate(),
        }
    }
}

/// Instruments and cadence of the live loop
#[derive(Debug, Clone, Deserialize)]
pub struct TradingConfig {
    /// Tracked instruments, e.g. ["BTCUSDT", "ETHUSDT"]
    pub pairs: Vec<String>,
    /// Candle interval, e.g. "15m"
    #[serde(default = "default_interval")]
    pub interval: String,
    /// Candles requested per evaluation
    #[serde(default = "default_candle_limit")]
    pub candle_limit: u32,
    /// Seconds between polling cycles
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Delay between consecutive exchange calls (rate-limit courtesy)
    #[serde(default = "default_inter_call_delay_ms")]
    pub inter_call_delay_ms: u64,
    /// Trailing stop distance in percent
    #[serde(default = "default_trailing_stop_pct")]
    pub trailing_stop_pct: Decimal,
    /// Take profit distance in percent
    #[serde(default = "default_take_profit_pct")]
    pub take_profit_pct: Decimal,
}

fn default_interval() -> String {
    "15m".to_string()
}
fn default_candle_limit() -> u32 {
    150
}
fn default_poll_interval_secs() -> u64 {
    30
}
fn default_inter_call_delay_ms() -> u64 {
    250
}
fn default_trailing_stop_pct() -> Decimal {
    Decimal::new(10, 1) // 1.0%
}
fn default_take_profit_pct() -> Decimal {
    Decimal::new(20, 1) // 2.0%
}

/// Position sizing and leverage search configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SizingConfig {
    /// Leverage applied to a symbol the account has never configured
    #[serde(default = "default_leverage")]
    pub default_leverage: u32,
    /// Hard leverage ceiling for the search
    #[serde(default = "default_max_leverage")]
    pub max_leverage: u32,
    /// Leverage increment between search steps
    #[serde(default = "default_leverage_step")]
    pub leverage_step: u32,
    /// Minimum order notional in quote currency
    #[serde(default = "default_min_notional")]
    pub min_notional: Decimal,
    /// Below this available balance the account counts as small
    #[serde(default = "default_min_balance_threshold")]
    pub min_balance_threshold: Decimal,
    /// Fraction of available balance committed by a normal account
    #[serde(default = "default_position_size_buffer")]
    pub position_size_buffer: Decimal,
    /// Fraction of available balance committed by a small account
    #[serde(default = "default_small_account_fraction")]
    pub small_account_fraction: Decimal,
}

fn default_leverage() -> u32 {
    3
}
fn default_max_leverage() -> u32 {
    MAX_EXCHANGE_LEVERAGE
}
fn default_leverage_step() -> u32 {
    5
}
fn default_min_notional() -> Decimal {
    Decimal::new(20, 0)
}
fn default_min_balance_threshold() -> Decimal {
    Decimal::new(100, 0)
}
fn default_position_size_buffer() -> Decimal {
    Decimal::new(90, 2) // 0.90
}
fn default_small_account_fraction() -> Decimal {
    Decimal::new(95, 2) // 0.95
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            default_leverage: default_leverage(),
            max_leverage: default_max_leverage(),
            leverage_step: default_leverage_step(),
            min_notional: default_min_notional(),
            min_balance_threshold: default_min_balance_threshold(),
            position_size_buffer: default_position_size_buffer(),
            small_account_fraction: default_small_account_fraction(),
        }
    }
}

/// Daily circuit breaker configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RiskConfig {
    /// Balance the daily loss limit is measured against
    #[serde(default = "default_initial_balance")]
    pub initial_balance: Decimal,
    /// Daily loss limit as a fraction of the initial balance
    #[serde(default = "default_daily_loss_limit")]
    pub daily_loss_limit: Decimal,
    /// Maximum opened trades per calendar day
    #[serde(default = "default_max_daily_trades")]
    pub max_daily_trades: u32,
    /// Persist the governor state across restarts
    #[serde(default)]
    pub persist_state: bool,
}

fn default_initial_balance() -> Decimal {
    Decimal::new(1000, 0)
}
fn default_daily_loss_limit() -> Decimal {
    Decimal::new(5, 2) // 5%
}
fn default_max_daily_trades() -> u32 {
    30
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            initial_balance: default_initial_balance(),
            daily_loss_limit: default_daily_loss_limit(),
            max_daily_trades: default_max_daily_trades(),
            persist_state: false,
        }
    }
}

/// Weighted consensus thresholds
#[derive(Debug, Clone, Deserialize)]
pub struct ConsensusConfig {
    /// Weight of each foundational strategy vote
    #[serde(default = "default_foundational_weight")]
    pub foundational_weight: Decimal,
    /// Weight of every other regular strategy vote
    #[serde(default = "default_regular_weight")]
    pub regular_weight: Decimal,
    /// Raw vote count that qualifies a direction on its own
    #[serde(default = "default_min_raw_votes")]
    pub min_raw_votes: usize,
    /// Foundational votes needed for the mixed rule
    #[serde(default = "default_min_mixed_votes")]
    pub min_foundational_votes: usize,
    /// Non-foundational votes needed for the mixed rule
    #[serde(default = "default_min_mixed_votes")]
    pub min_newer_votes: usize,
    /// Weighted score that qualifies a direction on its own
    #[serde(default = "default_high_score")]
    pub high_score: Decimal,
    /// Decisions below this confidence are not acted on
    #[serde(default)]
    pub min_confidence: Decimal,
}

fn default_foundational_weight() -> Decimal {
    Decimal::new(3, 0)
}
fn default_regular_weight() -> Decimal {
    Decimal::ONE
}
fn default_min_raw_votes() -> usize {
    5
}
fn default_min_mixed_votes() -> usize {
    2
}
fn default_high_score() -> Decimal {
    Decimal::new(8, 0)
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            foundational_weight: default_foundational_weight(),
            regular_weight: default_regular_weight(),
            min_raw_votes: default_min_raw_votes(),
            min_foundational_votes: default_min_mixed_votes(),
            min_newer_votes: default_min_mixed_votes(),
            high_score: default_high_score(),
            min_confidence: Decimal::ZERO,
        }
    }
}

/// Backtest replay configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BacktestConfig {
    /// Starting simulated balance
    #[serde(default = "default_initial_balance")]
    pub initial_balance: Decimal,
    /// Fraction of balance committed per simulated trade
    #[serde(default = "default_position_fraction")]
    pub position_fraction: Decimal,
    /// Candles a position is held before a time exit
    #[serde(default = "default_holding_candles")]
    pub holding_candles: usize,
    /// First candle index evaluated
    #[serde(default = "default_warmup")]
    pub warmup: usize,
    /// Balance sampling period in candles
    #[serde(default = "default_sample_every")]
    pub sample_every: usize,
    /// Route simulated trades through the daily circuit breaker
    #[serde(default)]
    pub apply_risk_limits: bool,
    /// Directory for reports
    #[serde(default = "default_report_dir")]
    pub report_dir: PathBuf,
}

fn default_position_fraction() -> Decimal {
    Decimal::new(10, 2) // 10%
}
fn default_holding_candles() -> usize {
    10
}
fn default_warmup() -> usize {
    100
}
fn default_sample_every() -> usize {
    96
}
fn default_report_dir() -> PathBuf {
    PathBuf::from("./reports")
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            initial_balance: default_initial_balance(),
            position_fraction: default_position_fraction(),
            holding_candles: default_holding_candles(),
            warmup: default_warmup(),
            sample_every: default_sample_every(),
            apply_risk_limits: false,
            report_dir: default_report_dir(),
        }
    }
}

/// Exchange call retry policy
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Attempts before the call is abandoned
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// First backoff delay in milliseconds
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Backoff ceiling in milliseconds
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    5
}
fn default_initial_delay_ms() -> u64 {
    500
}
fn default_max_delay_ms() -> u64 {
    8000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

/// Notification channels. Credentials come from the environment.
#[derive(Debug, Clone, Deserialize)]
pub struct NotifyConfig {
    #[serde(default = "default_true")]
    pub telegram: bool,
    #[serde(default = "default_true")]
    pub discord: bool,
    /// Username shown on Discord webhook posts
    #[serde(default = "default_discord_username")]
    pub discord_username: String,
}

fn default_true() -> bool {
    true
}
fn default_discord_username() -> String {
    "Trading Bot".to_string()
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            telegram: true,
            discord: true,
            discord_username: default_discord_username(),
        }
    }
}

/// Persisted operational state
#[derive(Debug, Clone, Deserialize)]
pub struct StateConfig {
    /// Directory holding status, positions and trade history files
    #[serde(default = "default_state_dir")]
    pub dir: PathBuf,
    /// Trade history entries kept
    #[serde(default = "default_history_cap")]
    pub history_cap: usize,
}

fn default_state_dir() -> PathBuf {
    PathBuf::from("./state")
}
fn default_history_cap() -> usize {
    100
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            dir: default_state_dir(),
            history_cap: default_history_cap(),
        }
    }
}

/// Candle cache and historical fetch configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub output_dir: PathBuf,
    /// Candles per historical request, capped at 1000 by the exchange
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Historical pages in flight at once
    #[serde(default = "default_fetch_concurrency")]
    pub fetch_concurrency: usize,
    /// Pause after each historical request
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}
fn default_page_size() -> u32 {
    1000
}
fn default_fetch_concurrency() -> usize {
    3
}
fn default_request_delay_ms() -> u64 {
    100
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            output_dir: default_data_dir(),
            page_size: default_page_size(),
            fetch_concurrency: default_fetch_concurrency(),
            request_delay_ms: default_request_delay_ms(),
        }
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    /// Prometheus exporter port, 0 disables the exporter
    #[serde(default)]
    pub metrics_port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable format
    #[default]
    Pretty,
    /// JSON format for log aggregation
    Json,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            metrics_port: 0,
            log_level: default_log_level(),
            log_format: LogFormat::Pretty,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values no component can operate with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.trading.pairs.is_empty() {
            return Err(ConfigError::NoTradingPairs);
        }
        let max = self.sizing.max_leverage;
        if max == 0 || max > MAX_EXCHANGE_LEVERAGE {
            return Err(ConfigError::LeverageCeiling(max));
        }
        if self.sizing.leverage_step == 0 {
            return Err(ConfigError::LeverageStep);
        }

        let fractions = [
            ("sizing.position_size_buffer", self.sizing.position_size_buffer),
            ("sizing.small_account_fraction", self.sizing.small_account_fraction),
            ("risk.daily_loss_limit", self.risk.daily_loss_limit),
            ("backtest.position_fraction", self.backtest.position_fraction),
        ];
        for (field, value) in fractions {
            if value <= Decimal::ZERO || value > Decimal::ONE {
                return Err(ConfigError::FractionOutOfRange { field, value });
            }
        }

        if self.backtest.holding_candles == 0 {
            return Err(ConfigError::HoldingHorizon);
        }
        if self.state.history_cap == 0 {
            return Err(ConfigError::HistoryCap);
        }
        if self.risk.max_daily_trades == 0 {
            return Err(ConfigError::MaxDailyTrades);
        }
        if self.data.page_size == 0 || self.data.page_size > 1000 {
            return Err(ConfigError::PageSize(self.data.page_size));
        }
        self.interval()?;
        Ok(())
    }

    /// Parsed `trading.interval`
    pub fn interval(&self) -> Result<Interval, ConfigError> {
        self.trading
            .interval
            .parse()
            .map_err(|_| ConfigError::InvalidInterval(self.trading.interval.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const MINIMAL: &str = r#"
        [trading]
        pairs = ["BTCUSDT", "ETHUSDT"]
    "#;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: Config = toml::from_str(MINIMAL).unwrap();
        assert_eq!(config.trading.pairs.len(), 2);
        assert_eq!(config.trading.interval, "15m");
        assert_eq!(config.exchange.mode, ExecutionMode::Paper);
        assert_eq!(config.sizing.max_leverage, 125);
        assert_eq!(config.sizing.position_size_buffer, dec!(0.90));
        assert_eq!(config.consensus.foundational_weight, dec!(3));
        assert_eq!(config.backtest.holding_candles, 10);
        assert_eq!(config.state.history_cap, 100);
        assert!(!config.risk.persist_state);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_deserialize_full() {
        let toml = r#"
            [exchange]
            mode = "live"
            base_url = "https://testnet.binancefuture.com"

            [trading]
            pairs = ["SOLUSDT"]
            interval = "1h"
            trailing_stop_pct = 1.5

            [sizing]
            max_leverage = 50
            leverage_step = 10
            min_notional = 5

            [risk]
            daily_loss_limit = 0.03
            max_daily_trades = 12
            persist_state = true

            [telemetry]
            metrics_port = 9090
            log_level = "debug"
            log_format = "json"
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.exchange.mode, ExecutionMode::Live);
        assert_eq!(config.trading.trailing_stop_pct, dec!(1.5));
        assert_eq!(config.sizing.leverage_step, 10);
        assert_eq!(config.risk.max_daily_trades, 12);
        assert_eq!(config.telemetry.log_format, LogFormat::Json);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_pairs() {
        let mut config: Config = toml::from_str(MINIMAL).unwrap();
        config.trading.pairs.clear();
        assert_eq!(config.validate(), Err(ConfigError::NoTradingPairs));
    }

    #[test]
    fn test_validate_rejects_leverage_ceiling() {
        let mut config: Config = toml::from_str(MINIMAL).unwrap();
        config.sizing.max_leverage = 200;
        assert_eq!(config.validate(), Err(ConfigError::LeverageCeiling(200)));
        config.sizing.max_leverage = 0;
        assert_eq!(config.validate(), Err(ConfigError::LeverageCeiling(0)));
    }

    #[test]
    fn test_validate_rejects_bad_fraction() {
        let mut config: Config = toml::from_str(MINIMAL).unwrap();
        config.sizing.position_size_buffer = dec!(1.2);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::FractionOutOfRange {
                field: "sizing.position_size_buffer",
                ..
            })
        ));
    }

    #[test]
    fn test_validate_rejects_unknown_interval() {
        let mut config: Config = toml::from_str(MINIMAL).unwrap();
        assert_eq!(config.interval(), Ok(Interval::FifteenMinutes));
        config.trading.interval = "7m".into();
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidInterval("7m".into()))
        );
    }

    #[test]
    fn test_config_load_nonexistent() {
        let result = Config::load("/nonexistent/path/config.toml");
        assert!(result.is_err());
    }

    #[test]
    fn test_example_config_parses() {
        let config: Config = toml::from_str(include_str!("../config.toml.example")).unwrap();
        assert!(config.validate().is_ok());
    }
}
