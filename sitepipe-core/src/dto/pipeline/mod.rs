//! Pipeline status DTOs

use serde::{Deserialize, Serialize};

use crate::domain::run::PipelineState;
use crate::dto::run::RunSummary;

/// Snapshot of the pipeline controller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineStatus {
    pub state: PipelineState,
    pub active_run: Option<RunSummary>,
    pub queued_revision: Option<String>,
    /// Most recently finished run
    pub last_run: Option<RunSummary>,
    pub published: PublishedSummary,
}

/// Currently live content
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedSummary {
    pub version: u64,
    pub artifact_id: Option<String>,
    pub file_count: usize,
}
