//! API client module
//!
//! HTTP client for the orchestrator control API.

use anyhow::{Context, Result};
use reqwest::Client;
use sitepipe_core::domain::log::LogEntry;
use sitepipe_core::domain::run::PipelineRun;
use sitepipe_core::dto::pipeline::PipelineStatus;
use sitepipe_core::dto::run::RunSummary;
use sitepipe_core::dto::site::SiteDescription;
use sitepipe_core::dto::trigger::{TriggerEvent, TriggerResponse};
use uuid::Uuid;

/// HTTP client for the orchestrator control API
pub struct ApiClient {
    base_url: String,
    client: Client,
}

impl ApiClient {
    /// Create a new API client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the control API
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Submit a repository change notification
    ///
    /// # Arguments
    /// * `event` - The change notification, as the repository would send it
    pub async fn trigger(&self, event: &TriggerEvent) -> Result<TriggerResponse> {
        let response = self
            .client
            .post(self.url("/hooks/repository"))
            .json(event)
            .send()
            .await
            .context("Failed to send trigger request")?;

        self.handle_response(response).await
    }

    /// List all runs, newest first
    pub async fn list_runs(&self) -> Result<Vec<RunSummary>> {
        let response = self
            .client
            .get(self.url("/runs"))
            .send()
            .await
            .context("Failed to send list runs request")?;

        self.handle_response(response).await
    }

    pub async fn get_run(&self, id: Uuid) -> Result<PipelineRun> {
        let response = self
            .client
            .get(self.url(&format!("/runs/{}", id)))
            .send()
            .await
            .context("Failed to send get run request")?;

        self.handle_response(response).await
    }

    pub async fn get_run_logs(&self, id: Uuid) -> Result<Vec<LogEntry>> {
        let response = self
            .client
            .get(self.url(&format!("/runs/{}/logs", id)))
            .send()
            .await
            .context("Failed to send get run logs request")?;

        self.handle_response(response).await
    }

    pub async fn pipeline_status(&self) -> Result<PipelineStatus> {
        let response = self
            .client
            .get(self.url("/pipeline"))
            .send()
            .await
            .context("Failed to send pipeline status request")?;

        self.handle_response(response).await
    }

    pub async fn site(&self) -> Result<SiteDescription> {
        let response = self
            .client
            .get(self.url("/site"))
            .send()
            .await
            .context("Failed to send site request")?;

        self.handle_response(response).await
    }

    /// Handle API response and deserialize JSON
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| v["error"].as_str().map(String::from))
                .unwrap_or(body);
            anyhow::bail!("Request failed with status {}: {}", status, message);
        }

        response
            .json()
            .await
            .context("Failed to parse response JSON")
    }
}
