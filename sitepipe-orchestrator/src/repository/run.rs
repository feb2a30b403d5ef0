//! Run Repository
//!
//! History of pipeline runs. A run that reached a terminal status can no
//! longer be overwritten.

use async_trait::async_trait;
use sitepipe_core::domain::run::PipelineRun;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum RunRepositoryError {
    #[error("run {0} is already {1} and cannot change")]
    Terminal(Uuid, sitepipe_core::domain::run::RunStatus),
}

#[async_trait]
pub trait RunRepository: Send + Sync {
    /// Inserts or updates a run
    async fn save(&self, run: &PipelineRun) -> Result<(), RunRepositoryError>;

    async fn find_by_id(&self, id: Uuid) -> Option<PipelineRun>;

    /// All runs, newest first
    async fn list(&self) -> Vec<PipelineRun>;
}

/// Run history kept in process memory
#[derive(Default)]
pub struct InMemoryRunRepository {
    runs: RwLock<HashMap<Uuid, PipelineRun>>,
}

impl InMemoryRunRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RunRepository for InMemoryRunRepository {
    async fn save(&self, run: &PipelineRun) -> Result<(), RunRepositoryError> {
        let mut runs = self.runs.write().await;
        if let Some(existing) = runs.get(&run.id) {
            if existing.status.is_terminal() {
                return Err(RunRepositoryError::Terminal(run.id, existing.status));
            }
        }
        runs.insert(run.id, run.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Option<PipelineRun> {
        self.runs.read().await.get(&id).cloned()
    }

    async fn list(&self) -> Vec<PipelineRun> {
        let mut runs: Vec<PipelineRun> = self.runs.read().await.values().cloned().collect();
        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        runs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sitepipe_core::domain::revision::SourceRevision;
    use sitepipe_core::domain::run::RunStatus;
    use sitepipe_core::error::RunFailure;

    fn run(id: &str) -> PipelineRun {
        PipelineRun::new(SourceRevision::new(id, "master", Utc::now()))
    }

    #[tokio::test]
    async fn test_terminal_runs_are_frozen() {
        let repo = InMemoryRunRepository::new();
        let mut run = run("abc123");
        repo.save(&run).await.unwrap();

        run.advance(RunStatus::Building).unwrap();
        run.fail(RunFailure::build("exit 1")).unwrap();
        repo.save(&run).await.unwrap();

        let mut tampered = run.clone();
        tampered.failure = None;
        assert!(matches!(
            repo.save(&tampered).await,
            Err(RunRepositoryError::Terminal(_, RunStatus::Failed))
        ));

        let stored = repo.find_by_id(run.id).await.unwrap();
        assert!(stored.failure.is_some());
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let repo = InMemoryRunRepository::new();
        let mut first = run("r1");
        first.started_at = Utc::now() - chrono::Duration::seconds(10);
        let second = run("r2");

        repo.save(&first).await.unwrap();
        repo.save(&second).await.unwrap();

        let ids: Vec<String> = repo
            .list()
            .await
            .iter()
            .map(|r| r.revision.id().to_string())
            .collect();
        assert_eq!(ids, vec!["r2", "r1"]);
    }
}
