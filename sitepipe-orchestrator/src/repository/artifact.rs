//! Artifact Repository
//!
//! Durable storage for build artifacts, keyed by content address.
//! Storing an artifact whose id already exists is a no-op.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sitepipe_core::domain::artifact::{BuildArtifact, FileTree, InvalidPath, Manifest};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("artifact {0} not found")]
    NotFound(String),

    #[error("artifact {id} is corrupt: {reason}")]
    Corrupt { id: String, reason: String },

    #[error("artifact contains an invalid path: {0}")]
    InvalidPath(#[from] InvalidPath),

    #[error("artifact store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Versioned blob storage for build outputs
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Stores an artifact under its id
    async fn put(&self, artifact: &BuildArtifact) -> Result<(), StoreError>;

    /// Loads an artifact with its files
    async fn get(&self, artifact_id: &str) -> Result<BuildArtifact, StoreError>;
}

/// Artifact store kept in process memory
#[derive(Default)]
pub struct InMemoryArtifactStore {
    artifacts: RwLock<HashMap<String, BuildArtifact>>,
}

impl InMemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.artifacts.read().await.len()
    }
}

#[async_trait]
impl ArtifactStore for InMemoryArtifactStore {
    async fn put(&self, artifact: &BuildArtifact) -> Result<(), StoreError> {
        let mut artifacts = self.artifacts.write().await;
        artifacts
            .entry(artifact.id().to_string())
            .or_insert_with(|| artifact.clone());
        Ok(())
    }

    async fn get(&self, artifact_id: &str) -> Result<BuildArtifact, StoreError> {
        self.artifacts
            .read()
            .await
            .get(artifact_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(artifact_id.to_string()))
    }
}

/// Record written next to the stored files
#[derive(Serialize, Deserialize)]
struct StoredManifest {
    id: String,
    revision_id: String,
    manifest: Manifest,
}

/// Artifact store on local disk
///
/// Layout: `<root>/<id>/manifest.json` plus `<root>/<id>/files/<path>`.
/// Artifacts are written to a temporary directory and renamed into place.
pub struct FilesystemArtifactStore {
    root: PathBuf,
}

impl FilesystemArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn artifact_dir(&self, artifact_id: &str) -> Result<PathBuf, StoreError> {
        if artifact_id.is_empty() || !artifact_id.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(StoreError::NotFound(artifact_id.to_string()));
        }
        Ok(self.root.join(artifact_id))
    }
}

#[async_trait]
impl ArtifactStore for FilesystemArtifactStore {
    async fn put(&self, artifact: &BuildArtifact) -> Result<(), StoreError> {
        let dest = self.artifact_dir(artifact.id())?;
        if tokio::fs::try_exists(dest.join("manifest.json")).await? {
            tracing::debug!("Artifact {} already stored", artifact.id());
            return Ok(());
        }

        let staging = self.root.join(format!(".staging-{}", Uuid::new_v4()));
        let files_dir = staging.join("files");
        tokio::fs::create_dir_all(&files_dir).await?;

        for (path, bytes) in artifact.files() {
            let file = files_dir.join(path);
            if let Some(parent) = file.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&file, bytes).await?;
        }

        let record = StoredManifest {
            id: artifact.id().to_string(),
            revision_id: artifact.revision_id().to_string(),
            manifest: artifact.manifest().clone(),
        };
        let json = serde_json::to_vec_pretty(&record).map_err(std::io::Error::other)?;
        tokio::fs::write(staging.join("manifest.json"), json).await?;

        match tokio::fs::rename(&staging, &dest).await {
            Ok(()) => {
                tracing::info!("Stored artifact {} ({} files)", artifact.id(), artifact.manifest().len());
                Ok(())
            }
            // Another writer stored the same content first
            Err(_) if tokio::fs::try_exists(dest.join("manifest.json")).await? => {
                tokio::fs::remove_dir_all(&staging).await?;
                Ok(())
            }
            Err(e) => {
                tokio::fs::remove_dir_all(&staging).await.ok();
                Err(e.into())
            }
        }
    }

    async fn get(&self, artifact_id: &str) -> Result<BuildArtifact, StoreError> {
        let dir = self.artifact_dir(artifact_id)?;
        let raw = match tokio::fs::read(dir.join("manifest.json")).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(artifact_id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let record: StoredManifest =
            serde_json::from_slice(&raw).map_err(|e| StoreError::Corrupt {
                id: artifact_id.to_string(),
                reason: e.to_string(),
            })?;

        let files = read_files(&dir.join("files"), &record.manifest).await?;
        let artifact = BuildArtifact::from_files(record.revision_id, files)?;

        if artifact.id() != record.id || record.id != artifact_id {
            return Err(StoreError::Corrupt {
                id: artifact_id.to_string(),
                reason: format!("content hashes to {}", artifact.id()),
            });
        }

        Ok(artifact)
    }
}

async fn read_files(files_dir: &Path, manifest: &Manifest) -> Result<FileTree, StoreError> {
    let mut files = FileTree::new();
    for path in manifest.paths() {
        sitepipe_core::domain::artifact::validate_relative_path(path)?;
        files.insert(path.to_string(), tokio::fs::read(files_dir.join(path)).await?);
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact() -> BuildArtifact {
        let files = FileTree::from([
            ("index.html".to_string(), b"<h1>home</h1>".to_vec()),
            ("assets/app.js".to_string(), b"console.log(1)".to_vec()),
        ]);
        BuildArtifact::from_files("abc123", files).unwrap()
    }

    #[tokio::test]
    async fn test_in_memory_put_is_idempotent() {
        let store = InMemoryArtifactStore::new();
        let artifact = artifact();

        store.put(&artifact).await.unwrap();
        store.put(&artifact).await.unwrap();

        assert_eq!(store.len().await, 1);
        assert_eq!(store.get(artifact.id()).await.unwrap(), artifact);
        assert!(matches!(
            store.get("deadbeef").await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_filesystem_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemArtifactStore::new(dir.path());
        let artifact = artifact();

        store.put(&artifact).await.unwrap();
        store.put(&artifact).await.unwrap();

        let loaded = store.get(artifact.id()).await.unwrap();
        assert_eq!(loaded.files(), artifact.files());
        assert_eq!(loaded.revision_id(), "abc123");
        assert!(dir.path().join(artifact.id()).join("files/assets/app.js").is_file());
    }

    #[tokio::test]
    async fn test_filesystem_detects_tampering() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemArtifactStore::new(dir.path());
        let artifact = artifact();
        store.put(&artifact).await.unwrap();

        std::fs::write(
            dir.path().join(artifact.id()).join("files/index.html"),
            "changed",
        )
        .unwrap();

        assert!(matches!(
            store.get(artifact.id()).await,
            Err(StoreError::Corrupt { .. })
        ));
    }

    #[tokio::test]
    async fn test_filesystem_rejects_non_hex_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemArtifactStore::new(dir.path());

        assert!(matches!(
            store.get("../etc").await,
            Err(StoreError::NotFound(_))
        ));
    }
}
