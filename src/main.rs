use anyhow::bail;
use chrono::Utc;
use clap::{Parser, Subcommand};
use configuration::{Config, init_logging, load_config};
use engine::{FvgTool, OrbTool, ProfileTool, TechnicalTool, ZoneAggregator, render};
use std::path::PathBuf;

/// The main entry point for the Confluence market-structure toolkit.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A .env file is optional; the API key may already be in the environment.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_deref())?;
    apply_overrides(&mut config, &cli.command)?;

    // Held until exit so buffered file logs are flushed.
    let _guard = init_logging(&config.logging)?;

    let provider = engine::provider_from_config(&config)?;
    let now = Utc::now();

    let output = match &cli.command {
        Commands::Zones(args) => {
            let tool = ZoneAggregator::new(provider, &config)?;
            render(&tool.zones(&args.symbol, now).await)?
        }
        Commands::Fvg(args) => {
            let tool = FvgTool::new(provider, &config);
            render(&tool.analyze(&args.symbol.symbol).await)?
        }
        Commands::Orb(args) => {
            let tool = OrbTool::new(provider, &config)?;
            render(&tool.analyze(&args.symbol.symbol).await)?
        }
        Commands::Profile(args) => {
            let tool = ProfileTool::new(provider, &config)?;
            render(&tool.analyze(&args.symbol, now).await)?
        }
        Commands::Technical(args) => {
            let tool = TechnicalTool::new(provider, &config)?;
            render(&tool.analyze(&args.symbol, now).await)?
        }
    };

    println!("{}", output);
    Ok(())
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// Market-structure analytics: volume profiles, zones, fair value gaps and opening ranges.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a TOML configuration file (defaults to ./config.toml when present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Support/resistance zones per timeframe.
    Zones(SymbolArgs),
    /// Fair value gaps across timeframes.
    Fvg(FvgArgs),
    /// Opening range breakout analysis for the latest session.
    Orb(OrbArgs),
    /// Volume profile per timeframe.
    Profile(SymbolArgs),
    /// Trend, momentum, divergence and Ichimoku readings per timeframe.
    Technical(SymbolArgs),
}

#[derive(clap::Args)]
struct SymbolArgs {
    /// The instrument to analyse (e.g., "SPY").
    #[arg(long)]
    symbol: String,
}

#[derive(clap::Args)]
struct FvgArgs {
    #[command(flatten)]
    symbol: SymbolArgs,

    /// Restrict the scan to these configured timeframe keys (e.g., "1m,5m").
    #[arg(long, value_delimiter = ',')]
    timeframes: Option<Vec<String>>,

    /// Number of recent bars scanned per timeframe.
    #[arg(long)]
    lookback_periods: Option<usize>,
}

#[derive(clap::Args)]
struct OrbArgs {
    #[command(flatten)]
    symbol: SymbolArgs,

    /// Opening range lengths in minutes (e.g., "5,15,30").
    #[arg(long, value_delimiter = ',')]
    periods: Option<Vec<u32>>,
}

/// Folds command-line tool options into the loaded configuration.
fn apply_overrides(config: &mut Config, command: &Commands) -> anyhow::Result<()> {
    match command {
        Commands::Fvg(args) => {
            if let Some(keys) = &args.timeframes {
                config.fvg.timeframes.retain(|tf| keys.contains(&tf.key));
                if config.fvg.timeframes.is_empty() {
                    bail!("none of the requested timeframes {:?} are configured", keys);
                }
            }
            if let Some(lookback) = args.lookback_periods {
                config.fvg.lookback_periods = lookback;
            }
        }
        Commands::Orb(args) => {
            if let Some(periods) = &args.periods {
                config.orb.periods = periods.clone();
            }
        }
        _ => {}
    }
    config.validate()?;
    Ok(())
}
