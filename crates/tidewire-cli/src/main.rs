//! # tidewire CLI
//!
//! Entry point for the `tidewire` binary.
//!
//! Subcommands:
//! - `tidewire call <method> [params]`: Issue one JSON-RPC call
//! - `tidewire batch <file>`: Issue many calls through the batching dispatcher
//! - `tidewire block-number`: Print the latest block number

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::Endpoint;

/// tidewire: batching JSON-RPC client for Ethereum-style nodes.
#[derive(Parser)]
#[command(name = "tidewire", version, about)]
struct Cli {
    /// HTTP(S) endpoint of the node (or set TIDEWIRE_RPC_URL env var).
    #[arg(long, env = "TIDEWIRE_RPC_URL", global = true)]
    url: Option<String>,

    /// Path to the node's IPC socket; takes precedence over --url.
    #[arg(long, global = true)]
    ipc: Option<PathBuf>,

    /// Bearer auth token for HTTP endpoints (or set TIDEWIRE_AUTH_TOKEN env var).
    #[arg(long, env = "TIDEWIRE_AUTH_TOKEN", global = true)]
    auth_token: Option<String>,

    /// Path to a dispatcher config YAML file.
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Issue a single JSON-RPC call and print its result.
    Call {
        /// Method name (e.g. eth_getBalance).
        method: String,

        /// Params as a JSON array (default: []).
        params: Option<String>,
    },

    /// Issue every call in a JSON file through the batching dispatcher.
    Batch {
        /// JSON array of {"method": ..., "params": [...]} objects.
        file: PathBuf,
    },

    /// Print the number of the most recent block.
    BlockNumber,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let endpoint = Endpoint {
        url: cli.url,
        ipc: cli.ipc,
        auth_token: cli.auth_token,
        config: cli.config,
    };

    let result = match cli.command {
        Commands::Call { method, params } => commands::call::run(&endpoint, method, params).await,
        Commands::Batch { file } => commands::batch::run(&endpoint, file).await,
        Commands::BlockNumber => commands::block_number::run(&endpoint).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
