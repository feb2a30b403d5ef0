//! Publish Target Repository
//!
//! The live content set of the site and the origin the edge reads from.
//!
//! - Single-file puts and deletes, each independently retriable
//! - A version token updated with compare-and-swap when a publish completes
//! - Read access for the edge through [`Origin`]

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sitepipe_core::domain::artifact::{FileTree, InvalidPath, Manifest, validate_relative_path};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;
use walkdir::WalkDir;

const TEMP_PREFIX: &str = ".sitepipe-";

/// Version token of the published set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedVersion {
    pub version: u64,
    /// Artifact the version was published from; `None` before the first publish
    pub artifact_id: Option<String>,
}

#[derive(Debug, Error)]
pub enum TargetError {
    #[error("published set is at version {found}, expected {expected}")]
    VersionMismatch { expected: u64, found: u64 },

    #[error("publish target unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    InvalidPath(#[from] InvalidPath),

    #[error("publish target I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Object read from the origin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginObject {
    pub body: Vec<u8>,
    /// Explicit `max-age` the origin attaches to the object
    pub max_age: Option<u64>,
}

/// Read side of the published set, used by the edge
#[async_trait]
pub trait Origin: Send + Sync {
    /// Returns `None` when no object exists at `path`
    async fn fetch(&self, path: &str) -> Result<Option<OriginObject>, TargetError>;
}

/// Write side of the published set
#[async_trait]
pub trait PublishTarget: Send + Sync {
    /// Paths currently live
    async fn list_current(&self) -> Result<Manifest, TargetError>;

    /// Creates or replaces one file
    async fn put_file(&self, path: &str, bytes: &[u8]) -> Result<(), TargetError>;

    /// Removes one file; removing a missing file succeeds
    async fn delete_file(&self, path: &str) -> Result<(), TargetError>;

    async fn current_version(&self) -> Result<PublishedVersion, TargetError>;

    /// Moves the version token from `expected` to `expected + 1`
    ///
    /// Fails with [`TargetError::VersionMismatch`] when another publish
    /// committed in between.
    async fn commit_version(
        &self,
        expected: u64,
        artifact_id: &str,
    ) -> Result<PublishedVersion, TargetError>;
}

// =============================================================================
// In-memory target
// =============================================================================

#[derive(Default)]
struct TargetState {
    files: FileTree,
    directives: HashMap<String, u64>,
    version: PublishedVersion,
    /// Remaining injected failures per path; `u32::MAX` never runs out
    faults: HashMap<String, u32>,
    history: Option<Vec<Manifest>>,
    latency: Duration,
}

impl TargetState {
    fn take_fault(&mut self, path: &str) -> bool {
        let Some(remaining) = self.faults.get_mut(path) else {
            return false;
        };
        match *remaining {
            0 => false,
            u32::MAX => true,
            _ => {
                *remaining -= 1;
                true
            }
        }
    }

    fn record(&mut self) {
        let manifest: Manifest = self.files.keys().cloned().collect();
        if let Some(history) = self.history.as_mut() {
            history.push(manifest);
        }
    }
}

/// Published set held in memory
///
/// Supports fault injection, artificial latency and recording of every
/// intermediate manifest so publish behaviour can be observed.
#[derive(Default)]
pub struct InMemoryPublishTarget {
    state: Mutex<TargetState>,
}

impl InMemoryPublishTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the live manifest after every mutation
    pub fn with_history(self) -> Self {
        self.lock().history = Some(Vec::new());
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TargetState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current files and their contents
    pub fn snapshot(&self) -> FileTree {
        self.lock().files.clone()
    }

    /// Manifests observed after each mutation, oldest first
    pub fn history(&self) -> Vec<Manifest> {
        self.lock().history.clone().unwrap_or_default()
    }

    /// Makes the next `times` operations on `path` fail; `u32::MAX` fails forever
    pub fn inject_fault(&self, path: impl Into<String>, times: u32) {
        self.lock().faults.insert(path.into(), times);
    }

    pub fn clear_faults(&self) {
        self.lock().faults.clear();
    }

    /// Delay applied to every put and delete
    pub fn set_latency(&self, latency: Duration) {
        self.lock().latency = latency;
    }

    /// Attaches an explicit `max-age` to an object
    pub fn set_cache_directive(&self, path: impl Into<String>, max_age: u64) {
        self.lock().directives.insert(path.into(), max_age);
    }

    async fn delay(&self) {
        let latency = self.lock().latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl Origin for InMemoryPublishTarget {
    async fn fetch(&self, path: &str) -> Result<Option<OriginObject>, TargetError> {
        let state = self.lock();
        Ok(state.files.get(path).map(|body| OriginObject {
            body: body.clone(),
            max_age: state.directives.get(path).copied(),
        }))
    }
}

#[async_trait]
impl PublishTarget for InMemoryPublishTarget {
    async fn list_current(&self) -> Result<Manifest, TargetError> {
        Ok(self.lock().files.keys().cloned().collect())
    }

    async fn put_file(&self, path: &str, bytes: &[u8]) -> Result<(), TargetError> {
        validate_relative_path(path)?;
        self.delay().await;

        let mut state = self.lock();
        if state.take_fault(path) {
            return Err(TargetError::Unavailable(format!("put {} rejected", path)));
        }
        state.files.insert(path.to_string(), bytes.to_vec());
        state.record();
        Ok(())
    }

    async fn delete_file(&self, path: &str) -> Result<(), TargetError> {
        validate_relative_path(path)?;
        self.delay().await;

        let mut state = self.lock();
        if state.take_fault(path) {
            return Err(TargetError::Unavailable(format!("delete {} rejected", path)));
        }
        state.files.remove(path);
        state.record();
        Ok(())
    }

    async fn current_version(&self) -> Result<PublishedVersion, TargetError> {
        Ok(self.lock().version.clone())
    }

    async fn commit_version(
        &self,
        expected: u64,
        artifact_id: &str,
    ) -> Result<PublishedVersion, TargetError> {
        let mut state = self.lock();
        if state.version.version != expected {
            return Err(TargetError::VersionMismatch {
                expected,
                found: state.version.version,
            });
        }

        state.version = PublishedVersion {
            version: expected + 1,
            artifact_id: Some(artifact_id.to_string()),
        };
        Ok(state.version.clone())
    }
}

// =============================================================================
// Filesystem target
// =============================================================================

/// Published set in a local directory
///
/// Live files are under `<root>/live`, the version token in
/// `<root>/version.json`. Each put writes a temporary file in the target
/// directory and renames it over the old one.
pub struct FilesystemPublishTarget {
    live: PathBuf,
    version_file: PathBuf,
    commit_lock: tokio::sync::Mutex<()>,
}

impl FilesystemPublishTarget {
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, TargetError> {
        let root = root.into();
        let live = root.join("live");
        tokio::fs::create_dir_all(&live).await?;

        Ok(Self {
            live,
            version_file: root.join("version.json"),
            commit_lock: tokio::sync::Mutex::new(()),
        })
    }

    pub fn live_dir(&self) -> &Path {
        &self.live
    }

    async fn read_version(&self) -> Result<PublishedVersion, TargetError> {
        match tokio::fs::read(&self.version_file).await {
            Ok(raw) => serde_json::from_slice(&raw)
                .map_err(|e| TargetError::Io(std::io::Error::other(e))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(PublishedVersion::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Removes now-empty directories between `file` and the live root
    async fn prune_empty_parents(&self, file: &Path) {
        let mut current = file.parent();
        while let Some(dir) = current {
            if dir == self.live || !dir.starts_with(&self.live) {
                break;
            }
            if tokio::fs::remove_dir(dir).await.is_err() {
                break;
            }
            current = dir.parent();
        }
    }
}

#[async_trait]
impl Origin for FilesystemPublishTarget {
    async fn fetch(&self, path: &str) -> Result<Option<OriginObject>, TargetError> {
        if validate_relative_path(path).is_err() || is_temp_name(path) {
            return Ok(None);
        }

        match tokio::fs::read(self.live.join(path)).await {
            Ok(body) => Ok(Some(OriginObject {
                body,
                max_age: None,
            })),
            Err(e)
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::NotFound | std::io::ErrorKind::IsADirectory
                ) =>
            {
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl PublishTarget for FilesystemPublishTarget {
    async fn list_current(&self) -> Result<Manifest, TargetError> {
        let live = self.live.clone();
        let paths = tokio::task::spawn_blocking(move || -> std::io::Result<Vec<String>> {
            let mut paths = Vec::new();
            for entry in WalkDir::new(&live).min_depth(1) {
                let entry = entry.map_err(std::io::Error::other)?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let relative = entry
                    .path()
                    .strip_prefix(&live)
                    .map_err(std::io::Error::other)?;
                let key = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                if !is_temp_name(&key) {
                    paths.push(key);
                }
            }
            Ok(paths)
        })
        .await
        .map_err(|e| TargetError::Io(std::io::Error::other(e)))??;

        Ok(paths.into_iter().collect())
    }

    async fn put_file(&self, path: &str, bytes: &[u8]) -> Result<(), TargetError> {
        validate_relative_path(path)?;
        let dest = self.live.join(path);
        let parent = dest.parent().unwrap_or(&self.live).to_path_buf();
        tokio::fs::create_dir_all(&parent).await?;

        let temp = parent.join(format!("{}{}.tmp", TEMP_PREFIX, Uuid::new_v4()));
        tokio::fs::write(&temp, bytes).await?;
        if let Err(e) = tokio::fs::rename(&temp, &dest).await {
            tokio::fs::remove_file(&temp).await.ok();
            return Err(e.into());
        }
        Ok(())
    }

    async fn delete_file(&self, path: &str) -> Result<(), TargetError> {
        validate_relative_path(path)?;
        let file = self.live.join(path);
        match tokio::fs::remove_file(&file).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        }
        self.prune_empty_parents(&file).await;
        Ok(())
    }

    async fn current_version(&self) -> Result<PublishedVersion, TargetError> {
        self.read_version().await
    }

    async fn commit_version(
        &self,
        expected: u64,
        artifact_id: &str,
    ) -> Result<PublishedVersion, TargetError> {
        let _guard = self.commit_lock.lock().await;

        let current = self.read_version().await?;
        if current.version != expected {
            return Err(TargetError::VersionMismatch {
                expected,
                found: current.version,
            });
        }

        let next = PublishedVersion {
            version: expected + 1,
            artifact_id: Some(artifact_id.to_string()),
        };
        let json = serde_json::to_vec(&next).map_err(std::io::Error::other)?;
        let temp = self
            .version_file
            .with_file_name(format!("{}version.tmp", TEMP_PREFIX));
        tokio::fs::write(&temp, json).await?;
        tokio::fs::rename(&temp, &self.version_file).await?;

        Ok(next)
    }
}

fn is_temp_name(path: &str) -> bool {
    path.rsplit('/')
        .next()
        .is_some_and(|name| name.starts_with(TEMP_PREFIX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_version_cas() {
        let target = InMemoryPublishTarget::new();
        assert_eq!(target.current_version().await.unwrap().version, 0);

        let committed = target.commit_version(0, "a1").await.unwrap();
        assert_eq!(committed.version, 1);

        let err = target.commit_version(0, "b2").await.unwrap_err();
        assert!(matches!(
            err,
            TargetError::VersionMismatch {
                expected: 0,
                found: 1
            }
        ));
    }

    #[tokio::test]
    async fn test_in_memory_fault_injection() {
        let target = InMemoryPublishTarget::new();
        target.inject_fault("index.html", 2);

        assert!(target.put_file("index.html", b"x").await.is_err());
        assert!(target.put_file("index.html", b"x").await.is_err());
        assert!(target.put_file("index.html", b"x").await.is_ok());
        assert!(target.fetch("index.html").await.unwrap().is_some());

        target.inject_fault("404.html", u32::MAX);
        for _ in 0..3 {
            assert!(target.put_file("404.html", b"x").await.is_err());
        }
    }

    #[tokio::test]
    async fn test_in_memory_rejects_bad_paths() {
        let target = InMemoryPublishTarget::new();
        assert!(matches!(
            target.put_file("../escape", b"x").await,
            Err(TargetError::InvalidPath(_))
        ));
    }

    #[tokio::test]
    async fn test_filesystem_put_list_delete() {
        let dir = tempfile::tempdir().unwrap();
        let target = FilesystemPublishTarget::open(dir.path()).await.unwrap();

        target.put_file("index.html", b"<h1>one</h1>").await.unwrap();
        target.put_file("assets/js/app.js", b"1").await.unwrap();
        target.put_file("index.html", b"<h1>two</h1>").await.unwrap();

        let manifest = target.list_current().await.unwrap();
        assert_eq!(
            manifest.paths().collect::<Vec<_>>(),
            vec!["assets/js/app.js", "index.html"]
        );

        let object = target.fetch("index.html").await.unwrap().unwrap();
        assert_eq!(object.body, b"<h1>two</h1>");

        target.delete_file("assets/js/app.js").await.unwrap();
        target.delete_file("assets/js/app.js").await.unwrap();
        assert!(!target.live_dir().join("assets").exists());
        assert!(target.fetch("assets/js/app.js").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_filesystem_version_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let target = FilesystemPublishTarget::open(dir.path()).await.unwrap();
            target.commit_version(0, "a1").await.unwrap();
        }

        let target = FilesystemPublishTarget::open(dir.path()).await.unwrap();
        let version = target.current_version().await.unwrap();
        assert_eq!(version.version, 1);
        assert_eq!(version.artifact_id.as_deref(), Some("a1"));
        assert!(target.commit_version(0, "b2").await.is_err());
    }
}
