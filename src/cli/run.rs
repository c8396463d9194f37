//! Run command implementation

use clap::Args;
use tokio_util::sync::CancellationToken;

use crate::config::{Config, ExecutionMode};
use crate::exchange::{BinanceCredentials, BinanceFuturesClient, Exchange, PaperExchange};
use crate::live::{LiveLoop, SymbolOutcome};
use crate::notify::MultiNotifier;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Force paper trading regardless of the configured mode
    #[arg(long, conflicts_with = "live")]
    pub paper: bool,

    /// Force live trading regardless of the configured mode
    #[arg(long)]
    pub live: bool,

    /// Run a single cycle and exit
    #[arg(long)]
    pub once: bool,
}

impl RunArgs {
    fn mode(&self, config: &Config) -> ExecutionMode {
        if self.paper {
            ExecutionMode::Paper
        } else if self.live {
            ExecutionMode::Live
        } else {
            config.exchange.mode
        }
    }

    pub async fn execute(&self, config: Config) -> anyhow::Result<()> {
        let notifier = MultiNotifier::from_config(&config.notify);
        tracing::info!(channels = ?notifier.channel_names(), "Notifiers configured");

        match self.mode(&config) {
            ExecutionMode::Paper => {
                tracing::info!(balance = %config.exchange.paper_balance, "Starting paper trading");
                let market = BinanceFuturesClient::new(&config.exchange, None)?;
                let paper = PaperExchange::from_config(market, config.interval()?, &config.exchange);
                self.drive(LiveLoop::new(paper, config, notifier)?).await
            }
            ExecutionMode::Live => {
                let credentials = BinanceCredentials::from_env().ok_or_else(|| {
                    anyhow::anyhow!("BINANCE_API_KEY and BINANCE_API_SECRET must be set for live trading")
                })?;
                tracing::warn!("Starting LIVE trading with real funds");
                let client = BinanceFuturesClient::new(&config.exchange, Some(credentials))?;
                self.drive(LiveLoop::new(client, config, notifier)?).await
            }
        }
    }

    async fn drive<E: Exchange>(&self, mut trader: LiveLoop<E>) -> anyhow::Result<()> {
        if self.once {
            trader.verify().await?;
            let report = trader.run_cycle().await?;
            for (symbol, outcome) in &report.outcomes {
                match outcome {
                    SymbolOutcome::Opened(p) => println!(
                        "{symbol}: opened {} {} @ {} ({}x)",
                        p.side, p.quantity, p.entry_price, p.leverage
                    ),
                    SymbolOutcome::Closed(t) => {
                        println!("{symbol}: closed @ {} ({}), P&L {}", t.exit_price, t.exit_reason, t.pnl)
                    }
                    SymbolOutcome::Skipped(reason) => println!("{symbol}: skipped, {reason}"),
                    SymbolOutcome::Failed(e) => println!("{symbol}: failed, {e}"),
                    other => println!("{symbol}: {other:?}"),
                }
            }
            return Ok(());
        }

        let shutdown = CancellationToken::new();
        let token = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Shutdown requested, finishing current cycle");
                token.cancel();
            }
        });

        trader.run(shutdown).await
    }
}
