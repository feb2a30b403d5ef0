//! Build service
//!
//! Turns a source revision into a site artifact:
//! - Checking the revision out into a per-run workspace
//! - Running install, compile and validate in order, failing fast
//! - Enforcing one wall-clock limit across checkout and all phases
//! - Collecting the output directory into a [`BuildArtifact`]
//!
//! The workspace is removed when the build ends, whatever the outcome.

use async_trait::async_trait;
use sitepipe_core::domain::artifact::{BuildArtifact, FileTree};
use sitepipe_core::domain::log::LogEntry;
use sitepipe_core::domain::revision::SourceRevision;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::environment::BuildEnvironment;
use crate::error::BuildError;
use crate::execution::ExecutionResult;
use crate::profile::BuildProfile;
use crate::service::log_buffer::LogBufferService;
use crate::source::SourceProvider;

/// Service trait for building a revision
#[async_trait]
pub trait BuildService: Send + Sync {
    /// Builds a revision into an artifact
    ///
    /// # Arguments
    /// * `run_id` - The pipeline run this build belongs to
    /// * `revision` - The revision to build
    /// * `log_buffer` - Sink for build output
    ///
    /// # Returns
    /// The complete artifact, or the error that stopped the build
    async fn build(
        &self,
        run_id: Uuid,
        revision: &SourceRevision,
        log_buffer: Arc<dyn LogBufferService>,
    ) -> Result<BuildArtifact, BuildError>;
}

/// Standard implementation of BuildService
pub struct StandardBuildService {
    environment: Arc<dyn BuildEnvironment>,
    source: Arc<dyn SourceProvider>,
    profile: BuildProfile,
    workspace_root: PathBuf,
}

impl StandardBuildService {
    pub fn new(
        environment: Arc<dyn BuildEnvironment>,
        source: Arc<dyn SourceProvider>,
        profile: BuildProfile,
        workspace_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            environment,
            source,
            profile,
            workspace_root: workspace_root.into(),
        }
    }

    pub fn profile(&self) -> &BuildProfile {
        &self.profile
    }

    /// Variables every build command sees
    fn phase_env(&self, revision: &SourceRevision) -> HashMap<String, String> {
        let mut env = self.profile.env_vars.clone();
        env.insert("SITEPIPE_REVISION".to_string(), revision.id().to_string());
        env.insert("SITEPIPE_BRANCH".to_string(), revision.branch().to_string());
        env.insert(
            "SITEPIPE_JOBS".to_string(),
            self.profile.compute.jobs().to_string(),
        );
        env
    }

    async fn run_phases(
        &self,
        revision: &SourceRevision,
        working_tree: &Path,
        deadline: Instant,
        log_buffer: &Arc<dyn LogBufferService>,
    ) -> Result<(), BuildError> {
        let env = self.phase_env(revision);

        for (phase, commands) in self.profile.phases() {
            if commands.is_empty() {
                continue;
            }

            log_buffer.add_entry(LogEntry::info(format!("Phase {} started", phase)));
            let remaining = deadline.saturating_duration_since(Instant::now());

            let result = self
                .environment
                .execute(commands, &env, working_tree, remaining)
                .await?;

            match result {
                ExecutionResult::Success { logs } => {
                    log_buffer.extend(logs);
                    debug!("Phase {} finished for {}", phase, revision);
                }
                ExecutionResult::Failure {
                    command,
                    exit_code,
                    logs,
                } => {
                    log_buffer.extend(logs);
                    return Err(BuildError::CommandFailed {
                        phase,
                        command,
                        exit_code,
                    });
                }
                ExecutionResult::Timeout { logs, .. } => {
                    log_buffer.extend(logs);
                    return Err(BuildError::Timeout {
                        limit: self.profile.timeout,
                    });
                }
            }
        }

        Ok(())
    }
}

#[async_trait]
impl BuildService for StandardBuildService {
    async fn build(
        &self,
        run_id: Uuid,
        revision: &SourceRevision,
        log_buffer: Arc<dyn LogBufferService>,
    ) -> Result<BuildArtifact, BuildError> {
        info!("Starting build of {} for run {}", revision, run_id);
        log_buffer.add_entry(LogEntry::info(format!("Building revision {}", revision)));

        let deadline = Instant::now() + self.profile.timeout;
        let workspace = Workspace::create(&self.workspace_root, run_id).await?;
        let working_tree = workspace.path().join("src");

        let result = async {
            let checkout = self.source.checkout(revision, &working_tree);
            timeout_at(deadline, checkout)
                .await
                .map_err(|_| BuildError::Timeout {
                    limit: self.profile.timeout,
                })??;
            self.run_phases(revision, &working_tree, deadline, &log_buffer)
                .await?;

            let output_dir = working_tree.join(&self.profile.output_dir);
            let files = collect_output(output_dir).await?;
            if files.is_empty() {
                return Err(BuildError::EmptyOutput(self.profile.output_dir.clone()));
            }

            Ok(BuildArtifact::from_files(revision.id(), files)?)
        }
        .await;

        match &result {
            Ok(artifact) => {
                info!(
                    "Build of {} produced artifact {} ({} files)",
                    revision,
                    artifact.id(),
                    artifact.manifest().len()
                );
                log_buffer.add_entry(LogEntry::info(format!(
                    "Build produced {} files",
                    artifact.manifest().len()
                )));
            }
            Err(e) => {
                warn!("Build of {} failed: {}", revision, e);
                log_buffer.add_entry(LogEntry::error(format!("Build failed: {}", e)));
            }
        }

        result
    }
}

/// Per-run directory removed on drop
struct Workspace {
    path: PathBuf,
}

impl Workspace {
    async fn create(root: &Path, run_id: Uuid) -> std::io::Result<Self> {
        let path = root.join(run_id.to_string());
        if tokio::fs::try_exists(&path).await? {
            tokio::fs::remove_dir_all(&path).await?;
        }
        tokio::fs::create_dir_all(&path).await?;
        Ok(Self { path })
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            warn!(
                "Failed to remove build workspace {}: {}",
                self.path.display(),
                e
            );
        }
    }
}

/// Reads every regular file below `output_dir` keyed by its `/`-separated relative path
async fn collect_output(output_dir: PathBuf) -> Result<FileTree, BuildError> {
    tokio::task::spawn_blocking(move || {
        let mut files = FileTree::new();
        if !output_dir.is_dir() {
            return Ok(files);
        }

        for entry in WalkDir::new(&output_dir).min_depth(1) {
            let entry = entry.map_err(std::io::Error::other)?;
            if !entry.file_type().is_file() {
                continue;
            }

            let relative = entry
                .path()
                .strip_prefix(&output_dir)
                .map_err(std::io::Error::other)?;
            let key = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            files.insert(key, std::fs::read(entry.path())?);
        }

        Ok(files)
    })
    .await
    .map_err(|e| BuildError::Io(std::io::Error::other(e)))?
}
