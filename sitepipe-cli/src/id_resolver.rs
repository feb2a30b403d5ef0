//! ID resolver module
//!
//! Resolves run ID prefixes to full UUIDs by querying the run list, so
//! users can type short, unambiguous prefixes instead of full UUIDs.

use anyhow::{Context, Result, anyhow};
use uuid::Uuid;

use crate::api::ApiClient;

/// Resolve a run ID or prefix to a full UUID
///
/// A full UUID is returned as is; anything else is matched as a prefix
/// against the run list.
///
/// # Errors
/// Returns an error if no run or more than one run matches the prefix, or
/// if the run list cannot be fetched.
pub async fn resolve_run_id(client: &ApiClient, id_or_prefix: &str) -> Result<Uuid> {
    if let Ok(uuid) = Uuid::parse_str(id_or_prefix) {
        return Ok(uuid);
    }

    let runs = client
        .list_runs()
        .await
        .context("Failed to fetch runs for ID resolution")?;

    match_prefix(runs.iter().map(|r| r.id), id_or_prefix)
}

fn match_prefix(ids: impl Iterator<Item = Uuid>, prefix: &str) -> Result<Uuid> {
    let prefix = prefix.to_lowercase();
    if prefix.is_empty() {
        return Err(anyhow!("Run ID prefix must not be empty"));
    }

    let matches: Vec<Uuid> = ids
        .filter(|id| id.to_string().starts_with(&prefix))
        .collect();

    match matches.as_slice() {
        [] => Err(anyhow!("No run found with ID starting with '{}'", prefix)),
        [id] => Ok(*id),
        _ => {
            let ids: Vec<String> = matches.iter().map(Uuid::to_string).collect();
            Err(anyhow!(
                "Ambiguous prefix '{}' matches multiple runs: {}",
                prefix,
                ids.join(", ")
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> Vec<Uuid> {
        [
            "3f2a1c4e-0000-4000-8000-000000000001",
            "3f2b9d10-0000-4000-8000-000000000002",
            "a0c1e2f3-0000-4000-8000-000000000003",
        ]
        .iter()
        .map(|s| Uuid::parse_str(s).unwrap())
        .collect()
    }

    #[test]
    fn test_unique_prefix() {
        let id = match_prefix(ids().into_iter(), "A0C").unwrap();
        assert_eq!(id, ids()[2]);
    }

    #[test]
    fn test_ambiguous_prefix() {
        let err = match_prefix(ids().into_iter(), "3f2").unwrap_err();
        assert!(err.to_string().contains("Ambiguous"));
    }

    #[test]
    fn test_unknown_prefix() {
        assert!(match_prefix(ids().into_iter(), "ffff").is_err());
        assert!(match_prefix(ids().into_iter(), "").is_err());
    }
}
