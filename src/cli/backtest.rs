//! Backtest command implementation

use chrono::Utc;
use clap::{Args, ValueEnum};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::path::PathBuf;

use super::{symbols_or_pairs, DateRange};
use crate::backtest::{write_report, BacktestSimulator};
use crate::config::Config;
use crate::data::{CandleReader, HistoryLoader};
use crate::exchange::{BinanceFuturesClient, RetryPolicy};
use crate::feed::Candle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Args, Debug)]
pub struct BacktestArgs {
    /// Symbols to replay, comma separated (defaults to trading.pairs, or
    /// every symbol in `--data`)
    #[arg(short, long, value_delimiter = ',')]
    pub symbols: Vec<String>,

    /// Parquet file written by `capture`; skips the network entirely
    #[arg(long)]
    pub data: Option<PathBuf>,

    #[command(flatten)]
    pub range: DateRange,

    /// Initial capital
    #[arg(long)]
    pub capital: Option<Decimal>,

    /// Holding horizon in candles
    #[arg(long)]
    pub holding: Option<usize>,

    /// Route simulated trades through the daily circuit breaker
    #[arg(long)]
    pub risk_limits: bool,

    /// Output directory for reports (defaults to backtest.report_dir)
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

impl BacktestArgs {
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(capital) = self.capital {
            config.backtest.initial_balance = capital;
        }
        if let Some(holding) = self.holding {
            config.backtest.holding_candles = holding;
        }
        if self.risk_limits {
            config.backtest.apply_risk_limits = true;
        }
        if let Some(output) = &self.output {
            config.backtest.report_dir = output.clone();
        }
    }

    async fn load(&self, config: &Config) -> anyhow::Result<BTreeMap<String, Vec<Candle>>> {
        if let Some(path) = &self.data {
            let mut series = CandleReader::new(path.clone()).read()?;
            if !self.symbols.is_empty() {
                let wanted = symbols_or_pairs(&self.symbols, config);
                series.retain(|symbol, _| wanted.contains(symbol));
            }
            anyhow::ensure!(!series.is_empty(), "no matching symbols in {}", path.display());
            return Ok(series);
        }

        let interval = config.interval()?;
        let (start, end) = self.range.resolve(Utc::now().date_naive())?;
        let client = BinanceFuturesClient::new(&config.exchange, None)?;
        let loader = HistoryLoader::new(&client, &config.data, RetryPolicy::from_config(&config.retry));

        let mut series = BTreeMap::new();
        for symbol in symbols_or_pairs(&self.symbols, config) {
            let candles = loader.fetch(&symbol, interval, start, end).await?;
            series.insert(symbol, candles);
        }
        Ok(series)
    }

    pub async fn execute(&self, mut config: Config) -> anyhow::Result<()> {
        self.apply_overrides(&mut config);
        config.validate()?;

        let series = self.load(&config).await?;
        let simulator = BacktestSimulator::from_config(&config);

        for (symbol, candles) in &series {
            tracing::info!(
                symbol = %symbol,
                candles = candles.len(),
                warmup = simulator.start_index(),
                "Running backtest"
            );
            let result = simulator.run(symbol, candles);
            let path = write_report(&result, &config.backtest.report_dir)?;

            match self.format {
                OutputFormat::Table => {
                    println!("{}", result.format_table());
                    println!("Report written to {}", path.display());
                }
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
            }
        }
        Ok(())
    }
}
