//! API Error Handling
//!
//! Errors answer with a JSON body `{"error": "..."}`. Rejected triggers also
//! carry a `reason` code naming the failed check.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use uuid::Uuid;

use crate::watcher::TriggerError;

/// API error type
#[derive(Debug)]
pub enum ApiError {
    /// No run with this id was ever recorded
    RunNotFound(Uuid),
    /// Hook body that is not a trigger event
    MalformedEvent(String),
    /// Well-formed event the watcher does not act on
    InvalidTrigger(TriggerError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::RunNotFound(id) => (
                StatusCode::NOT_FOUND,
                json!({ "error": format!("Run {} not found", id) }),
            ),
            ApiError::MalformedEvent(msg) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": format!("malformed event: {}", msg) }),
            ),
            ApiError::InvalidTrigger(err) => (
                StatusCode::BAD_REQUEST,
                json!({
                    "error": format!("invalid trigger: {}", err),
                    "reason": err.reason(),
                }),
            ),
        };

        (status, Json(body)).into_response()
    }
}

impl From<TriggerError> for ApiError {
    fn from(err: TriggerError) -> Self {
        ApiError::InvalidTrigger(err)
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
