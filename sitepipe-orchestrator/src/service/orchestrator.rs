//! Pipeline Orchestrator
//!
//! Single-writer controller driving revisions through build and publish.
//!
//! - At most one run is active (building or publishing) at any time
//! - Revisions arriving while a run is active wait in a single queue slot;
//!   a newer arrival replaces the waiting one
//! - Runs are recorded in the run repository and are never modified after
//!   reaching `Succeeded` or `Failed`
//! - Stage errors are converted to a [`RunFailure`] at the stage boundary
//! - A finished run leaves the pipeline in `Succeeded` or `Failed` until the
//!   queue is drained
//! - Revisions that fail or are superseded are released from the recent
//!   set so the watcher accepts them again
//!
//! `trigger` only touches the queue slot under a short lock and wakes the
//! driver. The driver task claims the slot, executes the run and drains
//! the queue again.

use sitepipe_core::domain::log::LogEntry;
use sitepipe_core::domain::revision::SourceRevision;
use sitepipe_core::domain::run::{PipelineRun, PipelineState, RunStatus};
use sitepipe_core::dto::pipeline::{PipelineStatus, PublishedSummary};
use sitepipe_core::dto::run::RunSummary;
use sitepipe_core::dto::trigger::TriggerDisposition;
use sitepipe_core::error::RunFailure;
use sitepipe_runner::{BuildService, InMemoryLogBuffer, LogBufferService};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::repository::{ArtifactStore, LogRepository, RunRepository};
use crate::service::publish::PublishService;
use crate::watcher::RecentRevisions;

/// Run currently occupying the pipeline
struct ActiveRun {
    run_id: Uuid,
    revision_id: String,
    status: RunStatus,
    cancel: CancellationToken,
}

struct ControllerState {
    state: PipelineState,
    active: Option<ActiveRun>,
    queued: Option<SourceRevision>,
    last_run: Option<Uuid>,
}

/// Collaborators of the orchestrator
pub struct OrchestratorDeps {
    pub builder: Arc<dyn BuildService>,
    pub artifacts: Arc<dyn ArtifactStore>,
    pub publisher: PublishService,
    pub runs: Arc<dyn RunRepository>,
    pub logs: Arc<dyn LogRepository>,
}

pub struct Orchestrator {
    controller: Mutex<ControllerState>,
    wake: Notify,
    builder: Arc<dyn BuildService>,
    artifacts: Arc<dyn ArtifactStore>,
    publisher: PublishService,
    runs: Arc<dyn RunRepository>,
    logs: Arc<dyn LogRepository>,
    recent: RecentRevisions,
    cancel_stale_builds: bool,
}

impl Orchestrator {
    pub fn new(deps: OrchestratorDeps) -> Self {
        Self {
            controller: Mutex::new(ControllerState {
                state: PipelineState::Idle,
                active: None,
                queued: None,
                last_run: None,
            }),
            wake: Notify::new(),
            builder: deps.builder,
            artifacts: deps.artifacts,
            publisher: deps.publisher,
            runs: deps.runs,
            logs: deps.logs,
            recent: RecentRevisions::new(),
            cancel_stale_builds: false,
        }
    }

    /// Cancels an in-flight build when a newer revision is queued
    pub fn with_cancel_stale_builds(mut self, enabled: bool) -> Self {
        self.cancel_stale_builds = enabled;
        self
    }

    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        self.controller.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn runs(&self) -> &Arc<dyn RunRepository> {
        &self.runs
    }

    pub fn logs(&self) -> &Arc<dyn LogRepository> {
        &self.logs
    }

    /// Revision ids that count as already delivered
    pub fn recent_revisions(&self) -> &RecentRevisions {
        &self.recent
    }

    pub fn state(&self) -> PipelineState {
        self.lock().state
    }

    /// Accepts a revision into the queue slot
    pub fn trigger(&self, revision: SourceRevision) -> TriggerDisposition {
        let disposition = {
            let mut controller = self.lock();

            let is_active = controller
                .active
                .as_ref()
                .is_some_and(|a| a.revision_id == revision.id());
            let is_queued = controller
                .queued
                .as_ref()
                .is_some_and(|q| q.id() == revision.id());
            if is_active || is_queued {
                debug!("Revision {} is already active or queued", revision);
                return TriggerDisposition::Duplicate;
            }

            let busy = controller.active.is_some();
            let disposition = match controller.queued.replace(revision.clone()) {
                Some(previous) => {
                    info!("Revision {} supersedes queued {}", revision, previous);
                    self.recent.forget(previous.id());
                    TriggerDisposition::Superseded {
                        previous: previous.id().to_string(),
                    }
                }
                None if busy => TriggerDisposition::Queued,
                None => TriggerDisposition::Started,
            };

            if !busy {
                controller.state = PipelineState::Queued;
            }

            if self.cancel_stale_builds {
                if let Some(active) = controller
                    .active
                    .as_ref()
                    .filter(|a| a.status == RunStatus::Building)
                {
                    info!(
                        "Cancelling stale build of {} in favour of {}",
                        active.revision_id, revision
                    );
                    active.cancel.cancel();
                }
            }

            disposition
        };

        self.wake.notify_one();
        disposition
    }

    /// Takes the queued revision and marks a new run active
    fn claim(&self) -> Option<(PipelineRun, CancellationToken)> {
        let mut controller = self.lock();
        if controller.active.is_some() {
            return None;
        }

        let revision = controller.queued.take()?;
        let run = PipelineRun::new(revision);
        let cancel = CancellationToken::new();

        controller.state = PipelineState::Building;
        controller.active = Some(ActiveRun {
            run_id: run.id,
            revision_id: run.revision.id().to_string(),
            status: RunStatus::Pending,
            cancel: cancel.clone(),
        });
        Some((run, cancel))
    }

    fn enter(&self, status: RunStatus) {
        let mut controller = self.lock();
        controller.state = match status {
            RunStatus::Publishing => PipelineState::Publishing,
            _ => PipelineState::Building,
        };
        if let Some(active) = controller.active.as_mut() {
            active.status = status;
        }
    }

    /// Releases the active slot, leaving the run's outcome as pipeline state
    fn finish(&self, run: &PipelineRun) {
        let mut controller = self.lock();
        controller.state = match run.status {
            RunStatus::Succeeded => PipelineState::Succeeded,
            _ => {
                self.recent.forget(run.revision.id());
                PipelineState::Failed
            }
        };
        controller.active = None;
        controller.last_run = Some(run.id);
        debug!("Pipeline reached {} with run {}", controller.state, run.id);
    }

    /// Moves a finished pipeline on to the waiting revision or back to idle
    fn drain_queue(&self) {
        let mut controller = self.lock();
        if controller.active.is_some() {
            return;
        }
        controller.state = if controller.queued.is_some() {
            PipelineState::Queued
        } else {
            PipelineState::Idle
        };
    }

    /// Executes the queued revision, if any, to a terminal run
    ///
    /// Returns the finished run, or `None` when nothing was queued.
    pub async fn run_next(&self) -> Option<PipelineRun> {
        let (mut run, cancel) = self.claim()?;
        info!("Starting run {} for revision {}", run.id, run.revision);

        self.execute(&mut run, cancel).await;
        self.finish(&run);
        info!("Run {} finished as {}", run.id, run.status);

        self.drain_queue();
        Some(run)
    }

    async fn execute(&self, run: &mut PipelineRun, cancel: CancellationToken) {
        self.transition(run, RunStatus::Building).await;
        self.enter(RunStatus::Building);

        let buffer = Arc::new(InMemoryLogBuffer::new());
        let build = self
            .builder
            .build(run.id, &run.revision, buffer.clone() as Arc<dyn LogBufferService>);

        let outcome = if self.cancel_stale_builds {
            tokio::select! {
                result = build => Some(result),
                _ = cancel.cancelled() => None,
            }
        } else {
            Some(build.await)
        };
        self.logs.append(run.id, buffer.drain()).await;

        let artifact = match outcome {
            Some(Ok(artifact)) => artifact,
            Some(Err(e)) => {
                return self.fail(run, RunFailure::build(e.to_string())).await;
            }
            None => {
                return self
                    .fail(run, RunFailure::build("superseded by a newer revision"))
                    .await;
            }
        };

        // Ownership passes to the store; publish reads it back from there
        if let Err(e) = self.artifacts.put(&artifact).await {
            return self
                .fail(run, RunFailure::build(format!("storing artifact: {}", e)))
                .await;
        }
        run.artifact_id = Some(artifact.id().to_string());
        let artifact = match self.artifacts.get(artifact.id()).await {
            Ok(stored) => stored,
            Err(e) => {
                return self
                    .fail(run, RunFailure::build(format!("loading artifact: {}", e)))
                    .await;
            }
        };

        self.transition(run, RunStatus::Publishing).await;
        self.enter(RunStatus::Publishing);

        let mut logs = vec![LogEntry::info(format!(
            "Publishing artifact {} ({} files)",
            artifact.id(),
            artifact.manifest().len()
        ))];
        let published = self.publisher.publish(&artifact, &mut logs).await;
        self.logs.append(run.id, logs).await;

        match published {
            Ok(report) => {
                run.published_version = Some(report.version);
                self.transition(run, RunStatus::Succeeded).await;
            }
            Err(e) => self.fail(run, RunFailure::publish(e.to_string())).await,
        }
    }

    async fn transition(&self, run: &mut PipelineRun, next: RunStatus) {
        if let Err(e) = run.advance(next) {
            error!("Run {}: {}", run.id, e);
            return;
        }
        self.persist(run).await;
    }

    async fn fail(&self, run: &mut PipelineRun, failure: RunFailure) {
        warn!("Run {} failed: {}", run.id, failure);
        self.logs
            .append(run.id, vec![LogEntry::error(failure.to_string())])
            .await;

        if let Err(e) = run.fail(failure) {
            error!("Run {}: {}", run.id, e);
            return;
        }
        self.persist(run).await;
    }

    async fn persist(&self, run: &PipelineRun) {
        if let Err(e) = self.runs.save(run).await {
            error!("Failed to record run {}: {}", run.id, e);
        }
    }

    /// Driver loop executing queued revisions until `shutdown` fires
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        info!("Pipeline driver started");
        loop {
            while self.run_next().await.is_some() {}

            tokio::select! {
                _ = self.wake.notified() => {}
                _ = shutdown.cancelled() => break,
            }
        }
        info!("Pipeline driver stopped");
    }

    /// Snapshot of controller state and the published set
    pub async fn status(&self) -> PipelineStatus {
        let (state, active_id, queued_revision, last_id) = {
            let controller = self.lock();
            (
                controller.state,
                controller.active.as_ref().map(|a| a.run_id),
                controller.queued.as_ref().map(|q| q.id().to_string()),
                controller.last_run,
            )
        };

        let active_run = match active_id {
            Some(id) => self.runs.find_by_id(id).await.map(|r| RunSummary::from(&r)),
            None => None,
        };
        let last_run = match last_id {
            Some(id) => self.runs.find_by_id(id).await.map(|r| RunSummary::from(&r)),
            None => None,
        };

        let target = self.publisher.target();
        let published = match (target.current_version().await, target.list_current().await) {
            (Ok(version), Ok(manifest)) => PublishedSummary {
                version: version.version,
                artifact_id: version.artifact_id,
                file_count: manifest.len(),
            },
            (Err(e), _) | (_, Err(e)) => {
                warn!("Published set unavailable: {}", e);
                PublishedSummary::default()
            }
        };

        PipelineStatus {
            state,
            active_run,
            queued_revision,
            last_run,
            published,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{
        InMemoryArtifactStore, InMemoryLogRepository, InMemoryPublishTarget, InMemoryRunRepository,
        PublishTarget,
    };
    use crate::service::publish::PublishSettings;
    use async_trait::async_trait;
    use chrono::Utc;
    use sitepipe_core::domain::artifact::{BuildArtifact, FileTree, Manifest};
    use sitepipe_core::error::FailureKind;
    use sitepipe_runner::BuildError;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::{Semaphore, mpsc};

    /// Builds a fixed site per revision, optionally waiting for a permit
    struct ScriptedBuilder {
        gate: Option<Arc<Semaphore>>,
        started: mpsc::UnboundedSender<String>,
        failing: HashSet<String>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl ScriptedBuilder {
        fn new(gated: bool) -> (Arc<Self>, mpsc::UnboundedReceiver<String>) {
            let (tx, rx) = mpsc::unbounded_channel();
            let builder = Self {
                gate: gated.then(|| Arc::new(Semaphore::new(0))),
                started: tx,
                failing: HashSet::new(),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            };
            (Arc::new(builder), rx)
        }

        fn failing(mut self: Arc<Self>, revision: &str) -> Arc<Self> {
            Arc::get_mut(&mut self)
                .unwrap()
                .failing
                .insert(revision.to_string());
            self
        }

        fn release(&self, permits: usize) {
            if let Some(gate) = &self.gate {
                gate.add_permits(permits);
            }
        }
    }

    fn site(revision: &str) -> FileTree {
        FileTree::from([
            (
                "index.html".to_string(),
                format!("<h1>{}</h1>", revision).into_bytes(),
            ),
            ("404.html".to_string(), b"not found".to_vec()),
            ("assets/app.js".to_string(), b"console.log(1)".to_vec()),
        ])
    }

    #[async_trait]
    impl BuildService for ScriptedBuilder {
        async fn build(
            &self,
            _run_id: Uuid,
            revision: &SourceRevision,
            log_buffer: Arc<dyn LogBufferService>,
        ) -> Result<BuildArtifact, BuildError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            self.started.send(revision.id().to_string()).ok();
            log_buffer.add_entry(LogEntry::info(format!("building {}", revision.id())));

            if let Some(gate) = &self.gate {
                gate.acquire().await.unwrap().forget();
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.failing.contains(revision.id()) {
                return Err(BuildError::EmptyOutput("public".to_string()));
            }
            Ok(BuildArtifact::from_files(revision.id(), site(revision.id())).unwrap())
        }
    }

    struct Harness {
        orchestrator: Arc<Orchestrator>,
        target: Arc<InMemoryPublishTarget>,
    }

    fn harness(builder: Arc<ScriptedBuilder>) -> Harness {
        harness_with(builder, false)
    }

    fn harness_with(builder: Arc<ScriptedBuilder>, cancel_stale_builds: bool) -> Harness {
        let target = Arc::new(InMemoryPublishTarget::new());
        let orchestrator = Orchestrator::new(OrchestratorDeps {
            builder,
            artifacts: Arc::new(InMemoryArtifactStore::new()),
            publisher: PublishService::new(target.clone(), PublishSettings::default()),
            runs: Arc::new(InMemoryRunRepository::new()),
            logs: Arc::new(InMemoryLogRepository::new()),
        })
        .with_cancel_stale_builds(cancel_stale_builds);
        Harness {
            orchestrator: Arc::new(orchestrator),
            target,
        }
    }

    fn revision(id: &str) -> SourceRevision {
        SourceRevision::new(id, "master", Utc::now())
    }

    async fn built_revisions(orchestrator: &Orchestrator) -> Vec<String> {
        let mut runs = orchestrator.runs().list().await;
        runs.reverse();
        runs.iter().map(|r| r.revision.id().to_string()).collect()
    }

    async fn wait_until_idle(orchestrator: &Orchestrator) {
        for _ in 0..500 {
            if orchestrator.state() == PipelineState::Idle {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("pipeline did not become idle");
    }

    #[tokio::test]
    async fn test_end_to_end_publish() {
        let (builder, _started) = ScriptedBuilder::new(false);
        let h = harness(builder);

        assert_eq!(
            h.orchestrator.trigger(revision("abc123")),
            TriggerDisposition::Started
        );
        assert_eq!(h.orchestrator.state(), PipelineState::Queued);

        let run = h.orchestrator.run_next().await.unwrap();
        assert_eq!(run.status, RunStatus::Succeeded);
        assert_eq!(run.published_version, Some(1));
        assert!(run.completed_at.is_some());

        let live: Manifest = h.target.snapshot().keys().cloned().collect();
        let expected: Manifest = ["index.html", "404.html", "assets/app.js"]
            .into_iter()
            .collect();
        assert_eq!(live, expected);

        let status = h.orchestrator.status().await;
        assert_eq!(status.state, PipelineState::Idle);
        assert_eq!(status.published.version, 1);
        assert_eq!(status.published.file_count, 3);
        assert_eq!(status.last_run.unwrap().status, RunStatus::Succeeded);

        let logs = h.orchestrator.logs().find_by_run(run.id).await;
        assert!(logs.iter().any(|e| e.message == "building abc123"));
        assert!(logs.iter().any(|e| e.message == "Published version 1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_edge_serves_previous_content_within_ttl() {
        use crate::edge::cache::{CacheStatus, EdgeCache};
        use sitepipe_core::domain::cache::CachePolicy;

        let (builder, _started) = ScriptedBuilder::new(false);
        let h = harness(builder);
        let edge = EdgeCache::new(CachePolicy::default(), h.target.clone());

        h.orchestrator.trigger(revision("abc123"));
        h.orchestrator.run_next().await.unwrap();
        let first = edge.get("/").await.unwrap();
        assert_eq!(first.object.body, "<h1>abc123</h1>");

        h.orchestrator.trigger(revision("def456"));
        h.orchestrator.run_next().await.unwrap();
        tokio::time::advance(Duration::from_secs(29)).await;
        let stale = edge.get("/").await.unwrap();
        assert_eq!(stale.status, CacheStatus::Hit);
        assert_eq!(stale.object.body, "<h1>abc123</h1>");

        tokio::time::advance(Duration::from_secs(1)).await;
        let fresh = edge.get("/").await.unwrap();
        assert_eq!(fresh.status, CacheStatus::Miss);
        assert_eq!(fresh.object.body, "<h1>def456</h1>");
    }

    #[tokio::test]
    async fn test_build_failure_leaves_published_set() {
        let (builder, _started) = ScriptedBuilder::new(false);
        let h = harness(builder.failing("bad"));

        h.orchestrator.trigger(revision("good"));
        h.orchestrator.run_next().await.unwrap();
        let before = h.target.snapshot();

        h.orchestrator.trigger(revision("bad"));
        let run = h.orchestrator.run_next().await.unwrap();

        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.failure.unwrap().kind, FailureKind::BuildFailure);
        assert_eq!(h.target.snapshot(), before);
        assert_eq!(h.target.current_version().await.unwrap().version, 1);
    }

    #[tokio::test]
    async fn test_publish_failure_marks_run_failed() {
        let (builder, _started) = ScriptedBuilder::new(false);
        let h = harness(builder);
        h.target.inject_fault("index.html", u32::MAX);

        h.orchestrator.trigger(revision("abc123"));
        let run = h.orchestrator.run_next().await.unwrap();

        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.failure.unwrap().kind, FailureKind::PublishFailure);
        assert!(run.artifact_id.is_some());
        assert_eq!(h.orchestrator.state(), PipelineState::Idle);
    }

    #[tokio::test]
    async fn test_outcome_held_until_queue_drains() {
        let (builder, _started) = ScriptedBuilder::new(false);
        let h = harness(builder.failing("bad"));

        h.orchestrator.trigger(revision("good"));
        let (mut run, cancel) = h.orchestrator.claim().unwrap();
        h.orchestrator.execute(&mut run, cancel).await;
        h.orchestrator.finish(&run);
        assert_eq!(h.orchestrator.state(), PipelineState::Succeeded);
        assert_eq!(h.orchestrator.status().await.state, PipelineState::Succeeded);

        h.orchestrator.trigger(revision("bad"));
        h.orchestrator.drain_queue();
        assert_eq!(h.orchestrator.state(), PipelineState::Queued);

        let (mut run, cancel) = h.orchestrator.claim().unwrap();
        h.orchestrator.execute(&mut run, cancel).await;
        h.orchestrator.finish(&run);
        assert_eq!(h.orchestrator.state(), PipelineState::Failed);

        h.orchestrator.drain_queue();
        assert_eq!(h.orchestrator.state(), PipelineState::Idle);
    }

    #[tokio::test]
    async fn test_coalesces_queued_revisions() {
        let (builder, mut started) = ScriptedBuilder::new(true);
        let h = harness(builder.clone());
        let driver = tokio::spawn(h.orchestrator.clone().run(CancellationToken::new()));

        assert_eq!(h.orchestrator.trigger(revision("r0")), TriggerDisposition::Started);
        assert_eq!(started.recv().await.unwrap(), "r0");
        assert_eq!(h.orchestrator.state(), PipelineState::Building);

        assert_eq!(h.orchestrator.trigger(revision("r1")), TriggerDisposition::Queued);
        assert_eq!(
            h.orchestrator.trigger(revision("r2")),
            TriggerDisposition::Superseded {
                previous: "r1".to_string()
            }
        );
        assert_eq!(
            h.orchestrator.trigger(revision("r3")),
            TriggerDisposition::Superseded {
                previous: "r2".to_string()
            }
        );
        assert_eq!(h.orchestrator.state(), PipelineState::Building);

        builder.release(10);
        assert_eq!(started.recv().await.unwrap(), "r3");
        wait_until_idle(&h.orchestrator).await;

        assert_eq!(built_revisions(&h.orchestrator).await, vec!["r0", "r3"]);
        assert_eq!(h.target.current_version().await.unwrap().version, 2);
        driver.abort();
    }

    #[tokio::test]
    async fn test_runs_never_overlap() {
        let (builder, _started) = ScriptedBuilder::new(true);
        let h = harness(builder.clone());
        let driver = tokio::spawn(h.orchestrator.clone().run(CancellationToken::new()));

        for i in 0..20 {
            h.orchestrator.trigger(revision(&format!("rev{}", i)));
            if i % 5 == 0 {
                builder.release(1);
            }
            tokio::task::yield_now().await;
        }
        builder.release(100);
        wait_until_idle(&h.orchestrator).await;

        assert_eq!(builder.max_in_flight.load(Ordering::SeqCst), 1);
        let runs = h.orchestrator.runs().list().await;
        assert!(runs.iter().all(|r| r.status == RunStatus::Succeeded));
        assert_eq!(runs[0].revision.id(), "rev19");
        driver.abort();
    }

    #[tokio::test]
    async fn test_duplicate_while_active_or_queued() {
        let (builder, mut started) = ScriptedBuilder::new(true);
        let h = harness(builder.clone());
        let driver = tokio::spawn(h.orchestrator.clone().run(CancellationToken::new()));

        h.orchestrator.trigger(revision("r0"));
        started.recv().await.unwrap();

        assert_eq!(h.orchestrator.trigger(revision("r0")), TriggerDisposition::Duplicate);
        assert_eq!(h.orchestrator.trigger(revision("r1")), TriggerDisposition::Queued);
        assert_eq!(h.orchestrator.trigger(revision("r1")), TriggerDisposition::Duplicate);

        builder.release(10);
        wait_until_idle(&h.orchestrator).await;
        assert_eq!(built_revisions(&h.orchestrator).await, vec!["r0", "r1"]);
        driver.abort();
    }

    #[tokio::test]
    async fn test_retrigger_after_success_creates_new_run() {
        let (builder, _started) = ScriptedBuilder::new(false);
        let h = harness(builder);

        h.orchestrator.trigger(revision("abc123"));
        let first = h.orchestrator.run_next().await.unwrap();
        let before = h.target.snapshot();

        h.orchestrator.trigger(revision("abc123"));
        let second = h.orchestrator.run_next().await.unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(second.status, RunStatus::Succeeded);
        assert_eq!(h.target.snapshot(), before);

        let stored = h.orchestrator.runs().find_by_id(first.id).await.unwrap();
        assert_eq!(stored.status, RunStatus::Succeeded);
        assert_eq!(stored.completed_at, first.completed_at);
    }

    #[tokio::test]
    async fn test_cancel_stale_build() {
        let (builder, mut started) = ScriptedBuilder::new(true);
        let orchestrator = harness_with(builder.clone(), true).orchestrator;
        let driver = tokio::spawn(orchestrator.clone().run(CancellationToken::new()));

        orchestrator.trigger(revision("old"));
        assert_eq!(started.recv().await.unwrap(), "old");
        orchestrator.trigger(revision("new"));

        assert_eq!(started.recv().await.unwrap(), "new");
        builder.release(1);
        wait_until_idle(&orchestrator).await;

        let runs = orchestrator.runs().list().await;
        let old = runs.iter().find(|r| r.revision.id() == "old").unwrap();
        let new = runs.iter().find(|r| r.revision.id() == "new").unwrap();
        assert_eq!(old.status, RunStatus::Failed);
        assert_eq!(old.failure.as_ref().unwrap().kind, FailureKind::BuildFailure);
        assert_eq!(new.status, RunStatus::Succeeded);
        driver.abort();
    }

    #[tokio::test]
    async fn test_driver_stops_on_shutdown() {
        let (builder, _started) = ScriptedBuilder::new(false);
        let h = harness(builder);
        let shutdown = CancellationToken::new();
        let driver = tokio::spawn(h.orchestrator.clone().run(shutdown.clone()));

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), driver)
            .await
            .unwrap()
            .unwrap();
    }
}
