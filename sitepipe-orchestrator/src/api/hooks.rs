//! Repository Hook Handler
//!
//! Entry point for change notifications from the source repository.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};
use sitepipe_core::dto::trigger::{TriggerEvent, TriggerResponse};

use crate::api::AppState;
use crate::api::error::{ApiError, ApiResult};

/// POST /hooks/repository
/// Pass a change notification through the source watcher
pub async fn repository_event(
    State(state): State<AppState>,
    payload: Result<Json<TriggerEvent>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<TriggerResponse>)> {
    let Json(event) = payload.map_err(|e| ApiError::MalformedEvent(e.body_text()))?;
    tracing::info!(
        "Repository event {:?} for {} on {}",
        event.event_kind,
        event.revision_id,
        event.branch
    );

    let response = state.watcher.handle(event)?;
    Ok((StatusCode::ACCEPTED, Json(response)))
}
