//! Pipeline status and site commands

use anyhow::Result;
use colored::*;
use sitepipe_core::domain::run::PipelineState;

use crate::api::ApiClient;
use crate::commands::run::{colorize_status, print_run_summary};
use crate::config::Config;

pub async fn show_status(config: &Config) -> Result<()> {
    let client = ApiClient::new(&config.orchestrator_url);
    let status = client.pipeline_status().await?;

    let state = format!("{:?}", status.state);
    let state = match status.state {
        PipelineState::Idle | PipelineState::Succeeded => state.green(),
        PipelineState::Failed => state.red(),
        _ => state.cyan(),
    };

    println!("{}", "Pipeline:".bold());
    println!("  State:     {}", state);
    match &status.active_run {
        Some(run) => println!(
            "  Active:    {} ({})",
            run.revision_id.cyan(),
            colorize_status(run.status)
        ),
        None => println!("  Active:    {}", "none".dimmed()),
    }
    println!(
        "  Queued:    {}",
        status
            .queued_revision
            .as_deref()
            .unwrap_or("none")
            .dimmed()
    );

    println!("\n{}", "Published:".bold());
    println!("  Version:   {}", status.published.version);
    println!(
        "  Artifact:  {}",
        status
            .published
            .artifact_id
            .as_deref()
            .unwrap_or("none")
            .dimmed()
    );
    println!("  Files:     {}", status.published.file_count);

    if let Some(last) = &status.last_run {
        println!("\n{}", "Last run:".bold());
        print_run_summary(last);
    }

    Ok(())
}

pub async fn show_site(config: &Config) -> Result<()> {
    let client = ApiClient::new(&config.orchestrator_url);
    let site = client.site().await?;

    println!("{}", "Site:".bold());
    println!("  Canonical:   https://{}", site.binding.canonical.cyan());
    println!("  Alias:       {}", site.binding.alias);
    println!("  Certificate: {}", site.binding.certificate_arn.dimmed());

    println!("\n{}", "Edge:".bold());
    println!("  Origin:      {}", site.edge.origin_id);
    println!(
        "  TTL:         default {}s, minimum {}s",
        site.edge.policy.default_ttl(),
        site.edge.policy.min_ttl()
    );
    println!("  Viewers:     {:?}", site.edge.viewer_protocol_policy);

    println!("\n{}", "DNS records:".bold());
    for record in &site.dns_records {
        println!(
            "  {:<30} {:<5} → {} ({})",
            record.name,
            format!("{:?}", record.record_type).to_uppercase(),
            record.alias_target,
            record.hosted_zone_id.dimmed()
        );
    }

    Ok(())
}
