//! API Module
//!
//! HTTP control API of the orchestrator.
//! Each submodule handles endpoints for a specific domain.

pub mod error;
pub mod health;
pub mod hooks;
pub mod runs;
pub mod site;

use axum::{
    Router,
    routing::{get, post},
};
use sitepipe_core::dto::site::SiteDescription;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::service::Orchestrator;
use crate::watcher::SourceWatcher;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub watcher: Arc<SourceWatcher>,
    pub site: Arc<SiteDescription>,
}

/// Create the control API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Repository notifications
        .route("/hooks/repository", post(hooks::repository_event))
        // Pipeline and run history
        .route("/pipeline", get(runs::pipeline_status))
        .route("/runs", get(runs::list_runs))
        .route("/runs/{id}", get(runs::get_run))
        .route("/runs/{id}/logs", get(runs::get_run_logs))
        // Site binding
        .route("/site", get(site::site_description))
        // Add state and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::repository::{
        InMemoryArtifactStore, InMemoryLogRepository, InMemoryPublishTarget, InMemoryRunRepository,
    };
    use crate::service::{OrchestratorDeps, PublishService, PublishSettings};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use serde_json::Value;
    use sitepipe_core::domain::artifact::{BuildArtifact, FileTree};
    use sitepipe_core::domain::log::LogEntry;
    use sitepipe_core::domain::revision::SourceRevision;
    use sitepipe_runner::{BuildError, BuildService, LogBufferService};
    use tower::ServiceExt;
    use uuid::Uuid;

    struct StaticSite;

    #[async_trait]
    impl BuildService for StaticSite {
        async fn build(
            &self,
            _run_id: Uuid,
            revision: &SourceRevision,
            log_buffer: Arc<dyn LogBufferService>,
        ) -> Result<BuildArtifact, BuildError> {
            log_buffer.add_entry(LogEntry::info(format!("built {}", revision.id())));
            let files = FileTree::from([
                ("index.html".to_string(), b"<h1>home</h1>".to_vec()),
                ("404.html".to_string(), b"missing".to_vec()),
                ("assets/app.js".to_string(), b"console.log(1)".to_vec()),
            ]);
            Ok(BuildArtifact::from_files(revision.id(), files).unwrap())
        }
    }

    fn state() -> AppState {
        let config = Config::from_lookup(|name: &str| match name {
            "SITE_DOMAIN_NAME" => Some("example.com".to_string()),
            "SITE_CERTIFICATE_ARN" => {
                Some("arn:aws:acm:us-east-1:123456789012:certificate/abc".to_string())
            }
            "BUILD_COMPILE" => Some("true".to_string()),
            _ => None,
        })
        .unwrap();

        let orchestrator = Arc::new(Orchestrator::new(OrchestratorDeps {
            builder: Arc::new(StaticSite),
            artifacts: Arc::new(InMemoryArtifactStore::new()),
            publisher: PublishService::new(
                Arc::new(InMemoryPublishTarget::new()),
                PublishSettings::default(),
            ),
            runs: Arc::new(InMemoryRunRepository::new()),
            logs: Arc::new(InMemoryLogRepository::new()),
        }));
        let watcher = Arc::new(SourceWatcher::new(
            config.site.tracked_branch.clone(),
            orchestrator.clone(),
        ));

        AppState {
            orchestrator,
            watcher,
            site: Arc::new(config.site_description().unwrap()),
        }
    }

    fn hook(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/hooks/repository")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let app = create_router(state());
        let response = app.oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_hook_runs_pipeline() {
        let state = state();
        let app = create_router(state.clone());

        let response = app
            .clone()
            .oneshot(hook(
                r#"{"revisionId":"abc123","branch":"master","eventKind":"updated"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let body = json(response).await;
        assert_eq!(body["revision_id"], "abc123");
        assert_eq!(body["disposition"], "started");

        let run = state.orchestrator.run_next().await.unwrap();

        let runs = json(app.clone().oneshot(get("/runs")).await.unwrap()).await;
        assert_eq!(runs.as_array().unwrap().len(), 1);
        assert_eq!(runs[0]["status"], "Succeeded");

        let detail = app
            .clone()
            .oneshot(get(&format!("/runs/{}", run.id)))
            .await
            .unwrap();
        assert_eq!(detail.status(), StatusCode::OK);
        assert_eq!(json(detail).await["revision"]["id"], "abc123");

        let logs = json(
            app.clone()
                .oneshot(get(&format!("/runs/{}/logs", run.id)))
                .await
                .unwrap(),
        )
        .await;
        assert!(
            logs.as_array()
                .unwrap()
                .iter()
                .any(|entry| entry["message"] == "built abc123")
        );

        let status = json(app.oneshot(get("/pipeline")).await.unwrap()).await;
        assert_eq!(status["state"], "Idle");
        assert_eq!(status["published"]["version"], 1);
        assert_eq!(status["published"]["file_count"], 3);
    }

    #[tokio::test]
    async fn test_unqualified_hook_rejected() {
        let app = create_router(state());

        let response = app
            .clone()
            .oneshot(hook(
                r#"{"revisionId":"abc123","branch":"feature","eventKind":"updated"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json(response).await;
        assert!(body["error"].as_str().unwrap().contains("feature"));
        assert_eq!(body["reason"], "untracked_branch");

        let response = app
            .clone()
            .oneshot(hook(
                r#"{"revisionId":"abc123","branch":"master","eventKind":"deleted"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(json(response).await["reason"], "ignored_event_kind");

        let response = app.oneshot(hook(r#"{"revisionId":"#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json(response).await;
        assert!(body["error"].as_str().unwrap().starts_with("malformed event"));
        assert!(body.get("reason").is_none());
    }

    #[tokio::test]
    async fn test_duplicate_hook() {
        let app = create_router(state());
        let event = r#"{"revisionId":"abc123","branch":"master","eventKind":"created"}"#;

        app.clone().oneshot(hook(event)).await.unwrap();
        let response = app.oneshot(hook(event)).await.unwrap();
        assert_eq!(json(response).await["disposition"], "duplicate");
    }

    #[tokio::test]
    async fn test_unknown_run() {
        let app = create_router(state());

        let response = app
            .clone()
            .oneshot(get(&format!("/runs/{}", Uuid::new_v4())))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(json(response).await["error"].as_str().unwrap().ends_with("not found"));

        let response = app
            .oneshot(get(&format!("/runs/{}/logs", Uuid::new_v4())))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_site_description() {
        let app = create_router(state());

        let site = json(app.oneshot(get("/site")).await.unwrap()).await;
        assert_eq!(site["binding"]["canonical"], "example.com");
        assert_eq!(site["binding"]["alias"], "www.example.com");
        assert_eq!(site["edge"]["viewer_protocol_policy"], "redirect-to-https");
    }
}
