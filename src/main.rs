use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

mod cmd;

#[derive(Parser)]
#[command(name = "zkguard")]
#[command(version, about = "Verifiable-inference pipeline: predict, prove, verify on-chain")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    /// Also write JSON logs to .zkguard/logs/
    #[arg(long, global = true)]
    pub log_file: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the pipeline once: ingestion, inference, witness, proof, verification
    Run(RunArgs),
    /// Show or record deployed contract addresses
    Addresses {
        #[command(subcommand)]
        command: Option<AddressesCommands>,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
    /// List recorded pipeline runs
    History {
        /// Maximum number of runs to list
        #[arg(long, default_value = "10")]
        limit: usize,

        #[command(subcommand)]
        command: Option<HistoryCommands>,
    },
}

#[derive(Args, Clone, Debug)]
pub struct RunArgs {
    /// BTC volatility (default 0.45)
    #[arg(long, allow_hyphen_values = true)]
    pub btc_vol: Option<String>,

    /// ETH gas price in gwei (default 24)
    #[arg(long, allow_hyphen_values = true)]
    pub eth_gas: Option<String>,

    /// Market volume (default 1.2)
    #[arg(long, allow_hyphen_values = true)]
    pub volume: Option<String>,

    /// UI output mode: full, minimal, json
    #[arg(long, default_value = "full")]
    pub ui: String,

    /// Delay between progress lines in milliseconds. Overrides zkguard.toml.
    #[arg(long)]
    pub pacing_ms: Option<u64>,

    /// Network whose RPC endpoint and contract addresses are used
    #[arg(long)]
    pub network: Option<String>,

    /// Base URL of the model-serving backend
    #[arg(long)]
    pub inference_url: Option<String>,

    /// Preload the model before the run
    #[arg(long)]
    pub warm_up: bool,

    /// Don't save the run report under .zkguard/runs/
    #[arg(long)]
    pub no_record: bool,
}

#[derive(Subcommand, Clone)]
pub enum AddressesCommands {
    /// Show the addresses the pipeline will use
    Show {
        #[arg(long)]
        network: Option<String>,
    },
    /// Record a deployment in the manifest
    Record {
        /// Network name (defaults to the configured network)
        #[arg(long)]
        network: Option<String>,
        #[arg(long)]
        verifier: String,
        #[arg(long)]
        price_guard: String,
        /// Chain id (defaults to the known id of the network)
        #[arg(long)]
        chain_id: Option<u64>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Initialize a default zkguard.toml file
    Init,
}

#[derive(Subcommand, Clone)]
pub enum HistoryCommands {
    /// Show one recorded run
    Show {
        /// Run id or its first characters
        run_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    let log_dir = cli
        .log_file
        .then(|| project_dir.join(".zkguard").join("logs"));
    let _log_guard = zkguard::logging::init(cli.verbose, log_dir.as_deref())?;

    match &cli.command {
        Commands::Run(args) => cmd::cmd_run(&cli, &project_dir, args).await?,
        Commands::Addresses { command } => cmd::cmd_addresses(&project_dir, command.clone())?,
        Commands::Config { command } => cmd::cmd_config(&project_dir, command.clone())?,
        Commands::History { limit, command } => {
            cmd::cmd_history(&project_dir, *limit, command.clone())?
        }
    }

    Ok(())
}
