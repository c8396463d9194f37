use clap::Parser;
use consensus_trader::cli::{print_config, Cli, Commands};
use consensus_trader::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: Could not load config from {}: {}", cli.config, e);
            eprintln!("Using default configuration");
            toml::from_str(include_str!("../config.toml.example"))?
        }
    };

    // Initialize telemetry
    let _telemetry = consensus_trader::telemetry::init_telemetry(&config.telemetry)?;

    match cli.command {
        Commands::Run(args) => args.execute(config).await?,
        Commands::Capture(args) => {
            tracing::info!("Starting data capture");
            args.execute(&config).await?;
        }
        Commands::Backtest(args) => {
            tracing::info!("Starting backtest");
            args.execute(config).await?;
        }
        Commands::Status(args) => args.execute(&config)?,
        Commands::Config => print_config(&config),
    }

    Ok(())
}
