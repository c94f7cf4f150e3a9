//! UTXO-Chain CLI Application
//!
//! A command-line interface for building and validating a demo chain.

use clap::{Parser, Subcommand};
use utxo_chain::cli::{self, DemoOptions};
use utxo_chain::core::{ChainConfig, DEFAULT_DIFFICULTY, DEFAULT_MINIMUM_TRANSACTION_VALUE};

#[derive(Parser)]
#[command(name = "utxo-chain")]
#[command(author = "Darshan")]
#[command(version = "0.1.0")]
#[command(about = "A single-process UTXO blockchain in Rust", long_about = None)]
struct Cli {
    /// Mining difficulty (number of leading zero hex characters)
    #[arg(short, long, global = true, default_value_t = DEFAULT_DIFFICULTY)]
    difficulty: usize,

    /// Minimum value a transaction's inputs must add up to
    #[arg(short, long, global = true, default_value_t = DEFAULT_MINIMUM_TRANSACTION_VALUE)]
    min_value: u64,

    /// Mining threads per block
    #[arg(short, long, global = true, default_value = "1")]
    workers: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the wallet walkthrough and validate the resulting chain
    Demo {
        /// Value paid to wallet A by the genesis transaction
        #[arg(short, long, default_value = "100")]
        genesis_value: u64,

        /// Print the chain as pretty JSON
        #[arg(long)]
        json: bool,
    },

    /// Build the demo chain and validate it
    Validate {
        /// Corrupt a transaction before validating
        #[arg(long)]
        tamper: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let config = ChainConfig {
        difficulty: cli.difficulty,
        minimum_transaction_value: cli.min_value,
    };
    let mut options = DemoOptions {
        config,
        workers: cli.workers,
        ..Default::default()
    };

    match cli.command {
        Commands::Demo {
            genesis_value,
            json,
        } => {
            options.genesis_value = genesis_value;
            cli::cmd_demo(&options, json)
        }
        Commands::Validate { tamper } => cli::cmd_validate(&options, tamper),
    }
}
