//! OpTrack CLI - drive an operation tracker from simulated requests.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use optrack_tracker::{OperationTracker, TrackerConfig};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

mod simulate;

use simulate::SimulationOptions;

#[derive(Parser)]
#[command(name = "optrack")]
#[command(about = "Track a single in-flight online operation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Tracker config file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the tracker label
    #[arg(long, global = true)]
    label: Option<String>,

    /// Log at debug level unless RUST_LOG is set
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Issue simulated requests through a shared tracker
    Simulate {
        /// Number of requests
        #[arg(long, default_value = "3")]
        requests: usize,
        /// How long each request stays in flight
        #[arg(long, default_value = "100")]
        delay_ms: u64,
        /// Launch every request at once instead of one after another
        #[arg(long)]
        concurrent: bool,
    },
    /// Print version and effective configuration
    Info,
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_config(cli: &Cli) -> Result<TrackerConfig> {
    let mut config = match &cli.config {
        Some(path) => TrackerConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => TrackerConfig::default(),
    };
    if let Some(label) = &cli.label {
        config.label = label.clone();
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = load_config(&cli)?;

    match cli.command {
        Commands::Simulate { requests, delay_ms, concurrent } => {
            let tracker = OperationTracker::with_config(config);
            let options = SimulationOptions {
                requests,
                delay: Duration::from_millis(delay_ms),
                concurrent,
            };

            let report = simulate::run(tracker, options).await?;

            println!("Simulation finished");
            println!("  Completed: {}", report.completed);
            println!("  Rejected: {}", report.rejected);
            println!("  Transitions: {}", report.transitions.len());
        }
        Commands::Info => {
            println!("OpTrack v{}", env!("CARGO_PKG_VERSION"));
            println!("Config:");
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
