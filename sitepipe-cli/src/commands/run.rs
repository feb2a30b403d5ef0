//! Run command handlers
//!
//! Listing runs, viewing run details and reading run logs.

use anyhow::Result;
use clap::Subcommand;
use colored::*;
use sitepipe_core::domain::log::{LogEntry, LogLevel};
use sitepipe_core::domain::run::{PipelineRun, RunStatus};
use sitepipe_core::dto::run::RunSummary;

use crate::api::ApiClient;
use crate::config::Config;
use crate::id_resolver::resolve_run_id;

/// Run subcommands
#[derive(Subcommand)]
pub enum RunCommands {
    /// List all runs, newest first
    List,
    /// Get run details
    Get {
        /// Run ID or unambiguous prefix
        id: String,
    },
    /// Get run logs
    Logs {
        /// Run ID or unambiguous prefix
        id: String,
    },
}

pub async fn handle_run_command(command: RunCommands, config: &Config) -> Result<()> {
    let client = ApiClient::new(&config.orchestrator_url);

    match command {
        RunCommands::List => list_runs(&client).await,
        RunCommands::Get { id } => get_run(&client, &id).await,
        RunCommands::Logs { id } => get_run_logs(&client, &id).await,
    }
}

async fn list_runs(client: &ApiClient) -> Result<()> {
    let runs = client.list_runs().await?;

    if runs.is_empty() {
        println!("{}", "No runs found.".yellow());
    } else {
        println!("{}", format!("Found {} run(s):", runs.len()).bold());
        println!();
        for run in &runs {
            print_run_summary(run);
        }
    }

    Ok(())
}

async fn get_run(client: &ApiClient, id: &str) -> Result<()> {
    let uuid = resolve_run_id(client, id).await?;
    let run = client.get_run(uuid).await?;

    print_run_details(&run);

    Ok(())
}

async fn get_run_logs(client: &ApiClient, id: &str) -> Result<()> {
    let uuid = resolve_run_id(client, id).await?;
    let logs = client.get_run_logs(uuid).await?;

    if logs.is_empty() {
        println!("{}", "No logs found for this run.".yellow());
    } else {
        println!("{}", format!("Logs for run {}:", uuid).bold());
        println!("{}", "─".repeat(80).dimmed());
        for log in &logs {
            print_log_entry(log);
        }
        println!("{}", "─".repeat(80).dimmed());
    }

    Ok(())
}

pub fn print_run_summary(run: &RunSummary) {
    println!("  {} Run {}", "▸".cyan(), run.id.to_string().dimmed());
    println!("    Revision: {} ({})", run.revision_id, run.branch.dimmed());
    println!("    Status:   {}", colorize_status(run.status));
    println!(
        "    Started:  {}",
        run.started_at
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
            .dimmed()
    );
    if let Some(kind) = run.failure_kind {
        println!("    Failure:  {}", kind.to_string().red());
    }
    println!();
}

fn print_run_details(run: &PipelineRun) {
    println!("{}", "Run Details:".bold());
    println!("  ID:        {}", run.id.to_string().cyan());
    println!("  Revision:  {}", run.revision.id());
    println!("  Branch:    {}", run.revision.branch());
    println!("  Status:    {}", colorize_status(run.status));
    println!("  Started:   {}", run.started_at.format("%Y-%m-%d %H:%M:%S"));

    if let Some(completed) = run.completed_at {
        println!("  Completed: {}", completed.format("%Y-%m-%d %H:%M:%S"));
        let duration = completed.signed_duration_since(run.started_at);
        println!("  Duration:  {}s", duration.num_seconds());
    }

    if let Some(artifact) = &run.artifact_id {
        println!("  Artifact:  {}", artifact.dimmed());
    }
    if let Some(version) = run.published_version {
        println!("  Published: version {}", version.to_string().green());
    }

    if let Some(failure) = &run.failure {
        println!("\n{}", "Failure:".bold());
        println!("  {}", failure.kind.to_string().red());
        println!("  {}", failure.message);
    }
}

fn print_log_entry(log: &LogEntry) {
    let level_str = format!("{:?}", log.level).to_uppercase();
    let level_colored = match log.level {
        LogLevel::Debug => level_str.dimmed(),
        LogLevel::Info => level_str.cyan(),
        LogLevel::Warning => level_str.yellow(),
        LogLevel::Error => level_str.red(),
    };

    println!(
        "{} [{}] {}",
        log.timestamp.format("%H:%M:%S").to_string().dimmed(),
        level_colored,
        log.message
    );
}

pub fn colorize_status(status: RunStatus) -> ColoredString {
    let status_str = format!("{:?}", status);
    match status {
        RunStatus::Pending => status_str.dimmed(),
        RunStatus::Building | RunStatus::Publishing => status_str.cyan(),
        RunStatus::Succeeded => status_str.green(),
        RunStatus::Failed => status_str.red(),
    }
}
