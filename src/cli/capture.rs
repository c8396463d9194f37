//! Capture command implementation

use chrono::Utc;
use clap::Args;
use std::path::PathBuf;

use super::{symbols_or_pairs, DateRange};
use crate::config::Config;
use crate::data::{CandleWriter, HistoryLoader};
use crate::exchange::{BinanceFuturesClient, RetryPolicy};

#[derive(Args, Debug)]
pub struct CaptureArgs {
    /// Symbols to capture, comma separated (defaults to trading.pairs)
    #[arg(short, long, value_delimiter = ',')]
    pub symbols: Vec<String>,

    #[command(flatten)]
    pub range: DateRange,

    /// Output directory (defaults to data.output_dir)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl CaptureArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let interval = config.interval()?;
        let (start, end) = self.range.resolve(Utc::now().date_naive())?;
        let output = self
            .output
            .clone()
            .unwrap_or_else(|| config.data.output_dir.clone());

        let client = BinanceFuturesClient::new(&config.exchange, None)?;
        let loader = HistoryLoader::new(&client, &config.data, RetryPolicy::from_config(&config.retry));
        let writer = CandleWriter::new(output);

        for symbol in symbols_or_pairs(&self.symbols, config) {
            let candles = loader.fetch(&symbol, interval, start, end).await?;
            if candles.is_empty() {
                tracing::warn!(symbol = %symbol, %start, %end, "No candles in range");
                continue;
            }
            let path = writer.write(&symbol, interval, &candles)?;
            println!("{symbol}: {} candles -> {}", candles.len(), path.display());
        }
        Ok(())
    }
}
