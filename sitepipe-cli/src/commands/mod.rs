//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod run;
mod status;
mod trigger;

pub use run::RunCommands;

use anyhow::Result;
use clap::Subcommand;
use sitepipe_core::dto::trigger::EventKind;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Submit a revision as if the repository had reported it
    Trigger {
        /// Revision (commit) identifier
        revision: String,

        /// Branch the revision belongs to
        #[arg(long, default_value = "master")]
        branch: String,

        /// Reference event kind (created, updated, deleted)
        #[arg(long, default_value = "updated")]
        kind: EventKind,
    },
    /// Pipeline run history
    Run {
        #[command(subcommand)]
        command: RunCommands,
    },
    /// Show pipeline state and the published version
    Status,
    /// Show domain binding, edge settings and DNS records
    Site,
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Trigger {
            revision,
            branch,
            kind,
        } => trigger::handle_trigger(config, revision, branch, kind).await,
        Commands::Run { command } => run::handle_run_command(command, config).await,
        Commands::Status => status::show_status(config).await,
        Commands::Site => status::show_site(config).await,
    }
}
