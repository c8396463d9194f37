//! Status command implementation

use clap::Args;

use crate::config::Config;
use crate::state::StatusStore;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Number of recent trades to show
    #[arg(short, long, default_value = "10")]
    pub trades: usize,
}

impl StatusArgs {
    pub fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let store = StatusStore::new(&config.state);

        println!("consensus-trader status ({})", store.dir().display());
        match store.read_status()? {
            Some(status) => {
                println!("  Running: {}", status.running);
                println!("  Open positions: {}", status.open_positions);
                println!("  Total P&L: {}", status.total_pnl.round_dp(4));
                println!("  Last update: {}", status.last_update.to_rfc3339());
            }
            None => println!("  No status recorded yet"),
        }

        let positions = store.read_positions()?;
        if !positions.is_empty() {
            println!("Open positions:");
            for p in &positions {
                let stop = p
                    .trailing_stop
                    .map(|s| s.round_dp(4).to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "  {} {} {} @ {} ({}x) stop {}",
                    p.symbol, p.side, p.quantity, p.entry_price, p.leverage, stop
                );
            }
        }

        if let Some(risk) = store.load_risk_state()? {
            println!(
                "Risk: day {}, {} trades, P&L {}, tripped: {}",
                risk.trading_day,
                risk.daily_trade_count,
                risk.daily_realized_pnl.round_dp(4),
                risk.tripped.map_or_else(|| "no".to_string(), |r| r.to_string())
            );
        }

        let history = store.read_history()?;
        if !history.is_empty() {
            println!("Recent trades:");
            for t in history.iter().rev().take(self.trades) {
                println!(
                    "  {} {} {} -> {} ({}) P&L {}",
                    t.closed_at.format("%Y-%m-%d %H:%M"),
                    t.symbol,
                    t.entry_price,
                    t.exit_price,
                    t.exit_reason,
                    t.pnl.round_dp(4)
                );
            }
        }
        Ok(())
    }
}
