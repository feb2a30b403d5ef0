//! Source Watcher
//!
//! Filters repository change notifications and forwards each qualifying
//! revision to the orchestrator once. A revision whose run failed, or that
//! was superseded before it ran, is forgotten and may be delivered again.

use chrono::Utc;
use sitepipe_core::domain::revision::SourceRevision;
use sitepipe_core::dto::trigger::{EventKind, TriggerDisposition, TriggerEvent, TriggerResponse};
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tracing::{debug, warn};

use crate::service::Orchestrator;

/// Number of recently forwarded revision ids remembered for de-duplication
pub const SEEN_CAPACITY: usize = 1024;

/// Reasons an event does not start a pipeline run
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TriggerError {
    #[error("revision id must not be empty")]
    EmptyRevision,

    #[error("revision id '{0}' contains invalid characters")]
    InvalidRevision(String),

    #[error("branch '{branch}' is not tracked (tracking '{tracked}')")]
    UntrackedBranch { branch: String, tracked: String },

    #[error("{0:?} events do not trigger builds")]
    IgnoredEventKind(EventKind),
}

impl TriggerError {
    /// Stable code for the failed check
    pub fn reason(&self) -> &'static str {
        match self {
            TriggerError::EmptyRevision => "empty_revision",
            TriggerError::InvalidRevision(_) => "invalid_revision",
            TriggerError::UntrackedBranch { .. } => "untracked_branch",
            TriggerError::IgnoredEventKind(_) => "ignored_event_kind",
        }
    }
}

/// Checks whether `event` should start a run for `tracked_branch`
pub fn check_event(event: &TriggerEvent, tracked_branch: &str) -> Result<(), TriggerError> {
    let id = event.revision_id.trim();
    if id.is_empty() {
        return Err(TriggerError::EmptyRevision);
    }
    if id.len() > 255 || !id.chars().all(|c| c.is_ascii_alphanumeric() || "-_./".contains(c)) {
        return Err(TriggerError::InvalidRevision(event.revision_id.clone()));
    }

    if event.branch != tracked_branch {
        return Err(TriggerError::UntrackedBranch {
            branch: event.branch.clone(),
            tracked: tracked_branch.to_string(),
        });
    }

    match event.event_kind {
        EventKind::Created | EventKind::Updated => Ok(()),
        other => Err(TriggerError::IgnoredEventKind(other)),
    }
}

/// Pure predicate over an event
pub fn qualifies(event: &TriggerEvent, tracked_branch: &str) -> bool {
    check_event(event, tracked_branch).is_ok()
}

/// Bounded set of revision ids, evicting the oldest
#[derive(Default)]
struct SeenSet {
    ids: HashSet<String>,
    order: VecDeque<String>,
}

impl SeenSet {
    /// Inserts `id`, returning false when it was already present
    fn insert(&mut self, id: &str) -> bool {
        if self.ids.contains(id) {
            return false;
        }
        if self.order.len() == SEEN_CAPACITY {
            if let Some(oldest) = self.order.pop_front() {
                self.ids.remove(&oldest);
            }
        }
        self.ids.insert(id.to_string());
        self.order.push_back(id.to_string());
        true
    }

    fn remove(&mut self, id: &str) {
        if self.ids.remove(id) {
            self.order.retain(|seen| seen != id);
        }
    }
}

/// Revision ids forwarded recently, shared by the watcher and the orchestrator
#[derive(Default)]
pub struct RecentRevisions {
    seen: Mutex<SeenSet>,
}

impl RecentRevisions {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SeenSet> {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records `id`, returning false when it was already recorded
    pub fn insert(&self, id: &str) -> bool {
        self.lock().insert(id)
    }

    /// Allows `id` to be forwarded again
    pub fn forget(&self, id: &str) {
        self.lock().remove(id);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().ids.contains(id)
    }
}

pub struct SourceWatcher {
    tracked_branch: String,
    orchestrator: Arc<Orchestrator>,
}

impl SourceWatcher {
    pub fn new(tracked_branch: impl Into<String>, orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            tracked_branch: tracked_branch.into(),
            orchestrator,
        }
    }

    pub fn tracked_branch(&self) -> &str {
        &self.tracked_branch
    }

    /// Handles one notification from the repository
    ///
    /// Unqualified events are logged and dropped. A revision id already
    /// forwarded and not since released by the orchestrator is reported as a
    /// duplicate without reaching it.
    pub fn handle(&self, event: TriggerEvent) -> Result<TriggerResponse, TriggerError> {
        if let Err(e) = check_event(&event, &self.tracked_branch) {
            warn!("Dropping trigger for {}: {}", event.revision_id, e);
            return Err(e);
        }

        let revision_id = event.revision_id.trim().to_string();
        let fresh = self.orchestrator.recent_revisions().insert(&revision_id);

        let disposition = if fresh {
            let revision = SourceRevision::new(
                revision_id.clone(),
                event.branch,
                event.timestamp.unwrap_or_else(Utc::now),
            );
            self.orchestrator.trigger(revision)
        } else {
            debug!("Revision {} already forwarded", revision_id);
            TriggerDisposition::Duplicate
        };

        Ok(TriggerResponse {
            revision_id,
            disposition,
        })
    }
}
