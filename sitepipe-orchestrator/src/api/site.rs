//! Site API Handler

use axum::{Json, extract::State};
use sitepipe_core::dto::site::SiteDescription;

use crate::api::AppState;

/// GET /site
/// Domain binding, edge configuration and DNS records
pub async fn site_description(State(state): State<AppState>) -> Json<SiteDescription> {
    Json(state.site.as_ref().clone())
}
