//! Pipeline run domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::revision::SourceRevision;
use crate::error::RunFailure;

/// One attempt to build and publish a specific revision
///
/// Runs move forward through their statuses and become read-only once they
/// reach `Succeeded` or `Failed`. Retrying a revision creates a new run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    pub id: Uuid,
    pub revision: SourceRevision,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Content address of the artifact, set once the build succeeds
    pub artifact_id: Option<String>,
    /// Published-set version this run produced
    pub published_version: Option<u64>,
    pub failure: Option<RunFailure>,
}

impl PipelineRun {
    /// Creates a pending run for the given revision
    pub fn new(revision: SourceRevision) -> Self {
        Self {
            id: Uuid::new_v4(),
            revision,
            status: RunStatus::Pending,
            started_at: Utc::now(),
            completed_at: None,
            artifact_id: None,
            published_version: None,
            failure: None,
        }
    }

    /// Moves the run to `next`
    ///
    /// Returns an error when the run is already terminal or the move skips
    /// a stage; the run is left unchanged in that case.
    pub fn advance(&mut self, next: RunStatus) -> Result<(), InvalidTransition> {
        if !self.status.can_advance_to(next) {
            return Err(InvalidTransition {
                from: self.status,
                to: next,
            });
        }

        self.status = next;
        if next.is_terminal() {
            self.completed_at = Some(Utc::now());
        }
        Ok(())
    }

    /// Marks the run failed with the given reason
    pub fn fail(&mut self, failure: RunFailure) -> Result<(), InvalidTransition> {
        self.advance(RunStatus::Failed)?;
        self.failure = Some(failure);
        Ok(())
    }
}

/// Status of a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunStatus {
    Pending,
    Building,
    Publishing,
    Succeeded,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Succeeded | RunStatus::Failed)
    }

    /// Building or publishing
    pub fn is_active(self) -> bool {
        matches!(self, RunStatus::Building | RunStatus::Publishing)
    }

    fn can_advance_to(self, next: RunStatus) -> bool {
        matches!(
            (self, next),
            (RunStatus::Pending, RunStatus::Building)
                | (RunStatus::Pending, RunStatus::Failed)
                | (RunStatus::Building, RunStatus::Publishing)
                | (RunStatus::Building, RunStatus::Failed)
                | (RunStatus::Publishing, RunStatus::Succeeded)
                | (RunStatus::Publishing, RunStatus::Failed)
        )
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Pending => write!(f, "Pending"),
            RunStatus::Building => write!(f, "Building"),
            RunStatus::Publishing => write!(f, "Publishing"),
            RunStatus::Succeeded => write!(f, "Succeeded"),
            RunStatus::Failed => write!(f, "Failed"),
        }
    }
}

/// Rejected status change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid run transition {from} -> {to}")]
pub struct InvalidTransition {
    pub from: RunStatus,
    pub to: RunStatus,
}


/// State of the pipeline controller as a whole
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineState {
    Idle,
    Queued,
    Building,
    Publishing,
    Succeeded,
    Failed,
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineState::Idle => write!(f, "Idle"),
            PipelineState::Queued => write!(f, "Queued"),
            PipelineState::Building => write!(f, "Building"),
            PipelineState::Publishing => write!(f, "Publishing"),
            PipelineState::Succeeded => write!(f, "Succeeded"),
            PipelineState::Failed => write!(f, "Failed"),
        }
    }
}
