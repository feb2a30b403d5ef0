use anyhow::Context;
use sitepipe_orchestrator::api::{self, AppState};
use sitepipe_orchestrator::config::{Config, SourceLocation};
use sitepipe_orchestrator::edge::{self, EdgeNode};
use sitepipe_orchestrator::repository::{
    ArtifactStore, FilesystemArtifactStore, FilesystemPublishTarget, InMemoryArtifactStore,
    InMemoryLogRepository, InMemoryPublishTarget, InMemoryRunRepository, Origin, PublishTarget,
};
use sitepipe_orchestrator::service::{Orchestrator, OrchestratorDeps, PublishService};
use sitepipe_orchestrator::watcher::SourceWatcher;
use sitepipe_runner::{GitSource, LocalDirectorySource, ProcessEnvironment, SourceProvider, StandardBuildService};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sitepipe_orchestrator=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Sitepipe Orchestrator...");

    let config = Config::from_env().context("Failed to read configuration")?;
    config.validate().context("Invalid site configuration")?;
    let site = config
        .site_description()
        .context("Invalid site configuration")?;

    tracing::info!(
        "Serving {} (alias {}), tracking branch {}",
        site.binding.canonical,
        site.binding.alias,
        config.site.tracked_branch
    );

    // Storage
    let artifacts: Arc<dyn ArtifactStore> = match &config.artifact_dir {
        Some(dir) => Arc::new(FilesystemArtifactStore::new(dir)),
        None => Arc::new(InMemoryArtifactStore::new()),
    };
    let (target, origin): (Arc<dyn PublishTarget>, Arc<dyn Origin>) = match &config.publish_dir {
        Some(dir) => {
            let target = Arc::new(
                FilesystemPublishTarget::open(dir)
                    .await
                    .with_context(|| format!("Failed to open publish directory {}", dir.display()))?,
            );
            (target.clone(), target)
        }
        None => {
            let target = Arc::new(InMemoryPublishTarget::new());
            (target.clone(), target)
        }
    };

    // Build stage
    let source: Arc<dyn SourceProvider> = match &config.source {
        SourceLocation::Directory(dir) => Arc::new(LocalDirectorySource::new(dir)),
        SourceLocation::Repository(url) => Arc::new(GitSource::new(url)),
    };
    let builder = StandardBuildService::new(
        Arc::new(ProcessEnvironment::new()),
        source,
        config.build.clone(),
        &config.workspace_dir,
    );

    let orchestrator = Arc::new(
        Orchestrator::new(OrchestratorDeps {
            builder: Arc::new(builder),
            artifacts,
            publisher: PublishService::new(target, config.publish.clone()),
            runs: Arc::new(InMemoryRunRepository::new()),
            logs: Arc::new(InMemoryLogRepository::new()),
        })
        .with_cancel_stale_builds(config.cancel_stale_builds),
    );
    let watcher = Arc::new(SourceWatcher::new(
        config.site.tracked_branch.clone(),
        orchestrator.clone(),
    ));

    let shutdown = CancellationToken::new();
    let driver = tokio::spawn(orchestrator.clone().run(shutdown.clone()));

    // HTTP servers
    let node = Arc::new(EdgeNode::new(
        site.binding.clone(),
        site.edge.policy,
        site.edge.viewer_protocol_policy,
        origin,
    ));
    let edge_app = edge::create_edge_router(node);
    let control_app = api::create_router(AppState {
        orchestrator,
        watcher,
        site: Arc::new(site),
    });

    let control_listener = tokio::net::TcpListener::bind(&config.control_addr)
        .await
        .with_context(|| format!("Failed to bind control API to {}", config.control_addr))?;
    let edge_listener = tokio::net::TcpListener::bind(&config.edge_addr)
        .await
        .with_context(|| format!("Failed to bind edge server to {}", config.edge_addr))?;

    tracing::info!("Control API listening on {}", config.control_addr);
    tracing::info!("Edge server listening on {}", config.edge_addr);

    let signal = shutdown.clone();
    let control = axum::serve(control_listener, control_app)
        .with_graceful_shutdown(async move { signal.cancelled().await });
    let signal = shutdown.clone();
    let edge_server = axum::serve(edge_listener, edge_app)
        .with_graceful_shutdown(async move { signal.cancelled().await });

    let ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown requested");
        }
        ctrl_c.cancel();
    });

    let served = tokio::try_join!(
        async { control.await.context("Control API failed") },
        async { edge_server.await.context("Edge server failed") },
    );
    shutdown.cancel();
    driver.await.context("Pipeline driver panicked")?;
    served.map(|_| ())
}
