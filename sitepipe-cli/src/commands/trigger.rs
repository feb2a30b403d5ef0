//! Trigger command handler

use anyhow::Result;
use colored::*;
use sitepipe_core::dto::trigger::{EventKind, TriggerDisposition, TriggerEvent};

use crate::api::ApiClient;
use crate::config::Config;

pub async fn handle_trigger(
    config: &Config,
    revision: String,
    branch: String,
    kind: EventKind,
) -> Result<()> {
    let client = ApiClient::new(&config.orchestrator_url);
    let event = TriggerEvent::new(revision, branch, kind);

    let response = client.trigger(&event).await?;

    let outcome = match &response.disposition {
        TriggerDisposition::Started => "started".green(),
        TriggerDisposition::Queued => "queued behind the active run".cyan(),
        TriggerDisposition::Superseded { previous } => {
            format!("queued, replacing {}", previous).yellow()
        }
        TriggerDisposition::Duplicate => "already known, ignored".dimmed(),
    };

    println!(
        "{} Revision {} {}",
        "✓".green(),
        response.revision_id.cyan(),
        outcome
    );

    Ok(())
}
