//! Publish Service
//!
//! Replaces the published set with the contents of an artifact:
//! - Uploads every file of the new manifest first
//! - Then deletes files absent from the new manifest
//! - Retries each file operation with exponential backoff under a per-operation timeout
//! - Commits the version token with compare-and-swap
//!
//! Until the deletes finish the live set is a superset of the old and the
//! new manifest. A publish that fails halfway leaves that superset in place
//! for the next successful run to converge.

use sitepipe_core::domain::artifact::BuildArtifact;
use sitepipe_core::domain::log::LogEntry;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::repository::{PublishTarget, TargetError};

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("concurrent publish detected: expected version {expected}, found {found}")]
    Conflict { expected: u64, found: u64 },

    #[error("{operation} {path} failed after {attempts} attempt(s): {source}")]
    Operation {
        operation: &'static str,
        path: String,
        attempts: u32,
        #[source]
        source: TargetError,
    },

    #[error("{operation} {path} timed out after {attempts} attempt(s)")]
    Timeout {
        operation: &'static str,
        path: String,
        attempts: u32,
    },

    #[error("publish target error: {0}")]
    Target(#[from] TargetError),
}

/// Retry and timeout settings for file operations
#[derive(Debug, Clone)]
pub struct PublishSettings {
    pub op_timeout: Duration,
    /// Attempts per file operation, including the first
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for PublishSettings {
    fn default() -> Self {
        Self {
            op_timeout: Duration::from_secs(10),
            max_attempts: 4,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(5),
        }
    }
}

/// Outcome of a completed publish
#[derive(Debug, Clone)]
pub struct PublishReport {
    pub version: u64,
    pub uploaded: usize,
    pub deleted: usize,
}

/// Publishes artifacts to a target
pub struct PublishService {
    target: Arc<dyn PublishTarget>,
    settings: PublishSettings,
}

impl PublishService {
    pub fn new(target: Arc<dyn PublishTarget>, settings: PublishSettings) -> Self {
        Self { target, settings }
    }

    pub fn target(&self) -> &Arc<dyn PublishTarget> {
        &self.target
    }

    /// Makes `artifact` the live content
    ///
    /// # Arguments
    /// * `artifact` - The artifact to publish, with its files loaded
    /// * `logs` - Receives one entry per completed step
    pub async fn publish(
        &self,
        artifact: &BuildArtifact,
        logs: &mut Vec<LogEntry>,
    ) -> Result<PublishReport, PublishError> {
        let base = self.target.current_version().await?;
        let live = self.target.list_current().await?;
        info!(
            "Publishing artifact {} over version {} ({} live files)",
            artifact.id(),
            base.version,
            live.len()
        );

        let mut uploaded = 0;
        for (path, bytes) in artifact.files() {
            self.retry("put", path, || self.target.put_file(path, bytes))
                .await?;
            uploaded += 1;
        }
        logs.push(LogEntry::info(format!("Uploaded {} files", uploaded)));

        let stale: Vec<&str> = live.missing_from(artifact.manifest()).collect();
        for path in &stale {
            self.retry("delete", path, || self.target.delete_file(path))
                .await?;
        }
        if !stale.is_empty() {
            logs.push(LogEntry::info(format!("Deleted {} stale files", stale.len())));
        }

        let committed = self
            .target
            .commit_version(base.version, artifact.id())
            .await
            .map_err(|e| match e {
                TargetError::VersionMismatch { expected, found } => {
                    PublishError::Conflict { expected, found }
                }
                other => PublishError::Target(other),
            })?;

        info!(
            "Published artifact {} as version {}",
            artifact.id(),
            committed.version
        );
        logs.push(LogEntry::info(format!(
            "Published version {}",
            committed.version
        )));

        Ok(PublishReport {
            version: committed.version,
            uploaded,
            deleted: stale.len(),
        })
    }

    /// Runs one file operation with timeout and exponential backoff
    async fn retry<F, Fut>(
        &self,
        operation: &'static str,
        path: &str,
        mut op: F,
    ) -> Result<(), PublishError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(), TargetError>>,
    {
        let mut delay = self.settings.initial_backoff;
        let mut attempt = 0;

        loop {
            attempt += 1;

            let failure = match tokio::time::timeout(self.settings.op_timeout, op()).await {
                Ok(Ok(())) => {
                    if attempt > 1 {
                        debug!("{} {} succeeded after {} attempts", operation, path, attempt);
                    }
                    return Ok(());
                }
                // A malformed path will not improve with retries
                Ok(Err(e @ TargetError::InvalidPath(_))) => {
                    return Err(PublishError::Operation {
                        operation,
                        path: path.to_string(),
                        attempts: attempt,
                        source: e,
                    });
                }
                Ok(Err(e)) => Some(e),
                Err(_) => None,
            };

            if attempt >= self.settings.max_attempts {
                return Err(match failure {
                    Some(source) => PublishError::Operation {
                        operation,
                        path: path.to_string(),
                        attempts: attempt,
                        source,
                    },
                    None => PublishError::Timeout {
                        operation,
                        path: path.to_string(),
                        attempts: attempt,
                    },
                });
            }

            warn!(
                "{} {} failed (attempt {}/{}), retrying in {:?}",
                operation, path, attempt, self.settings.max_attempts, delay
            );
            tokio::time::sleep(delay).await;
            delay = (delay * 2).min(self.settings.max_backoff);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryPublishTarget;
    use sitepipe_core::domain::artifact::{FileTree, Manifest};

    fn artifact(files: &[(&str, &str)]) -> BuildArtifact {
        let tree: FileTree = files
            .iter()
            .map(|(p, c)| (p.to_string(), c.as_bytes().to_vec()))
            .collect();
        BuildArtifact::from_files("rev", tree).unwrap()
    }

    fn service(target: Arc<InMemoryPublishTarget>) -> PublishService {
        PublishService::new(
            target,
            PublishSettings {
                op_timeout: Duration::from_secs(1),
                max_attempts: 3,
                initial_backoff: Duration::from_millis(1),
                max_backoff: Duration::from_millis(4),
            },
        )
    }

    #[tokio::test]
    async fn test_publish_replaces_manifest() {
        let target = Arc::new(InMemoryPublishTarget::new());
        let publisher = service(target.clone());

        let old = artifact(&[("index.html", "old"), ("about.html", "about")]);
        publisher.publish(&old, &mut Vec::new()).await.unwrap();

        let new = artifact(&[
            ("index.html", "new"),
            ("404.html", "missing"),
            ("assets/app.js", "js"),
        ]);
        let report = publisher.publish(&new, &mut Vec::new()).await.unwrap();

        assert_eq!(report.version, 2);
        assert_eq!(report.uploaded, 3);
        assert_eq!(report.deleted, 1);
        let live: Manifest = target.snapshot().keys().cloned().collect();
        assert_eq!(&live, new.manifest());
        assert_eq!(target.snapshot()["index.html"], b"new");
    }

    #[tokio::test]
    async fn test_transition_is_superset() {
        let target = Arc::new(InMemoryPublishTarget::new().with_history());
        let publisher = service(target.clone());

        let old = artifact(&[("index.html", "1"), ("a.html", "a"), ("b.html", "b")]);
        publisher.publish(&old, &mut Vec::new()).await.unwrap();
        let skip = target.history().len();

        let new = artifact(&[("index.html", "2"), ("b.html", "b2"), ("c.html", "c")]);
        publisher.publish(&new, &mut Vec::new()).await.unwrap();

        let kept = old.manifest().intersection(new.manifest());
        for observed in target.history().iter().skip(skip) {
            assert!(observed.is_superset(&kept));
        }
        // Stale files only disappear once every new file is live
        let first_delete = target
            .history()
            .iter()
            .skip(skip)
            .find(|m| !m.contains("a.html"))
            .cloned()
            .unwrap();
        assert!(first_delete.is_superset(new.manifest()));
    }

    #[tokio::test]
    async fn test_transient_fault_is_retried() {
        let target = Arc::new(InMemoryPublishTarget::new());
        target.inject_fault("index.html", 2);
        let publisher = service(target.clone());

        let report = publisher
            .publish(&artifact(&[("index.html", "x")]), &mut Vec::new())
            .await
            .unwrap();
        assert_eq!(report.version, 1);
    }

    #[tokio::test]
    async fn test_persistent_fault_leaves_superset() {
        let target = Arc::new(InMemoryPublishTarget::new());
        let publisher = service(target.clone());

        let old = artifact(&[("index.html", "old"), ("stale.html", "stale")]);
        publisher.publish(&old, &mut Vec::new()).await.unwrap();

        target.inject_fault("stale.html", u32::MAX);
        let new = artifact(&[("index.html", "new"), ("fresh.html", "fresh")]);
        let err = publisher.publish(&new, &mut Vec::new()).await.unwrap_err();

        assert!(matches!(
            err,
            PublishError::Operation {
                operation: "delete",
                attempts: 3,
                ..
            }
        ));
        let live: Manifest = target.snapshot().keys().cloned().collect();
        assert!(live.is_superset(new.manifest()));
        assert!(live.contains("stale.html"));
        assert_eq!(target.current_version().await.unwrap().version, 1);

        // The next successful publish converges to a clean manifest
        target.clear_faults();
        publisher.publish(&new, &mut Vec::new()).await.unwrap();
        let live: Manifest = target.snapshot().keys().cloned().collect();
        assert_eq!(&live, new.manifest());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_operation_times_out() {
        let target = Arc::new(InMemoryPublishTarget::new());
        target.set_latency(Duration::from_secs(5));
        let publisher = service(target.clone());

        let err = publisher
            .publish(&artifact(&[("index.html", "x")]), &mut Vec::new())
            .await
            .unwrap_err();

        assert!(matches!(err, PublishError::Timeout { attempts: 3, .. }));
        assert!(target.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_commit_conflicts() {
        let target = Arc::new(InMemoryPublishTarget::new());
        let publisher = service(target.clone());

        // Another writer commits while this publish is between read and commit
        target.set_latency(Duration::from_millis(20));
        let racing = {
            let target = target.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                target.commit_version(0, "other").await.unwrap();
            })
        };

        let err = publisher
            .publish(&artifact(&[("index.html", "x")]), &mut Vec::new())
            .await
            .unwrap_err();
        racing.await.unwrap();

        assert!(matches!(
            err,
            PublishError::Conflict {
                expected: 0,
                found: 1
            }
        ));
    }
}
