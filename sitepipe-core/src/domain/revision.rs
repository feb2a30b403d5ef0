//! Source revision domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single commit on a tracked branch
///
/// Produced by the source watcher and consumed by exactly one pipeline run.
/// Fields are private so a revision cannot change after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRevision {
    id: String,
    branch: String,
    timestamp: DateTime<Utc>,
}

impl SourceRevision {
    pub fn new(id: impl Into<String>, branch: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            branch: branch.into(),
            timestamp,
        }
    }

    /// Revision id (commit hash or equivalent)
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    /// When the watcher accepted the revision
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Abbreviated id for log lines
    pub fn short_id(&self) -> &str {
        let end = self
            .id
            .char_indices()
            .nth(12)
            .map(|(idx, _)| idx)
            .unwrap_or(self.id.len());
        &self.id[..end]
    }
}

impl std::fmt::Display for SourceRevision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.short_id(), self.branch)
    }
}
