//! Run DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::run::{PipelineRun, RunStatus};
use crate::error::FailureKind;

/// Compact view of a pipeline run for listings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub id: Uuid,
    pub revision_id: String,
    pub branch: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failure_kind: Option<FailureKind>,
}

impl From<&PipelineRun> for RunSummary {
    fn from(run: &PipelineRun) -> Self {
        Self {
            id: run.id,
            revision_id: run.revision.id().to_string(),
            branch: run.revision.branch().to_string(),
            status: run.status,
            started_at: run.started_at,
            completed_at: run.completed_at,
            failure_kind: run.failure.as_ref().map(|f| f.kind),
        }
    }
}
