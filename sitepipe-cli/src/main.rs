//! Sitepipe CLI
//!
//! Command-line interface for the Sitepipe orchestrator control API.

mod api;
mod commands;
mod config;
mod id_resolver;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;

#[derive(Parser)]
#[command(name = "sitepipe")]
#[command(about = "Sitepipe static-site delivery CLI", long_about = None)]
struct Cli {
    /// Orchestrator control API URL
    #[arg(
        long,
        env = "SITEPIPE_ORCHESTRATOR_URL",
        default_value = "http://localhost:8080"
    )]
    orchestrator_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config {
        orchestrator_url: cli.orchestrator_url,
    };

    handle_command(cli.command, &config).await
}
