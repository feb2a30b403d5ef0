//! Run API Handlers
//!
//! Read access to run history and run logs.

use axum::{
    Json,
    extract::{Path, State},
};
use sitepipe_core::domain::log::LogEntry;
use sitepipe_core::domain::run::PipelineRun;
use sitepipe_core::dto::pipeline::PipelineStatus;
use sitepipe_core::dto::run::RunSummary;
use uuid::Uuid;

use crate::api::AppState;
use crate::api::error::{ApiError, ApiResult};

/// GET /pipeline
/// Controller state, active run, queue slot and live version
pub async fn pipeline_status(State(state): State<AppState>) -> Json<PipelineStatus> {
    Json(state.orchestrator.status().await)
}

/// GET /runs
/// List all runs, newest first
pub async fn list_runs(State(state): State<AppState>) -> Json<Vec<RunSummary>> {
    let runs = state.orchestrator.runs().list().await;
    Json(runs.iter().map(RunSummary::from).collect())
}

/// GET /runs/{id}
pub async fn get_run(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<PipelineRun>> {
    tracing::debug!("Getting run: {}", id);

    state
        .orchestrator
        .runs()
        .find_by_id(id)
        .await
        .map(Json)
        .ok_or(ApiError::RunNotFound(id))
}

/// GET /runs/{id}/logs
pub async fn get_run_logs(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<LogEntry>>> {
    if state.orchestrator.runs().find_by_id(id).await.is_none() {
        return Err(ApiError::RunNotFound(id));
    }

    Ok(Json(state.orchestrator.logs().find_by_run(id).await))
}
