//! Trigger DTOs for repository change notifications

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Change notification delivered by the repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerEvent {
    pub revision_id: String,
    pub branch: String,
    pub event_kind: EventKind,
    /// Commit time reported upstream; the watcher stamps arrival time when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl TriggerEvent {
    pub fn new(revision_id: impl Into<String>, branch: impl Into<String>, event_kind: EventKind) -> Self {
        Self {
            revision_id: revision_id.into(),
            branch: branch.into(),
            event_kind,
            timestamp: None,
        }
    }
}

/// Kind of reference change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Created,
    Updated,
    Deleted,
}

impl std::str::FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" | "referenceCreated" => Ok(EventKind::Created),
            "updated" | "referenceUpdated" => Ok(EventKind::Updated),
            "deleted" | "referenceDeleted" => Ok(EventKind::Deleted),
            other => Err(format!("unknown event kind '{}'", other)),
        }
    }
}

/// What happened to an accepted trigger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "disposition")]
pub enum TriggerDisposition {
    /// Pipeline was idle; the revision is next to run
    Started,
    /// A run is active; the revision waits in the queue slot
    Queued,
    /// A run is active; the revision replaced an older queued one
    Superseded { previous: String },
    /// The revision is already active, queued or recently seen
    Duplicate,
}

/// Response to a trigger submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerResponse {
    pub revision_id: String,
    #[serde(flatten)]
    pub disposition: TriggerDisposition,
}
