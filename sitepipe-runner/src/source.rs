//! Source checkout
//!
//! Materializes a revision's file tree into a fresh working directory.

use async_trait::async_trait;
use sitepipe_core::domain::revision::SourceRevision;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::BuildError;

/// Provides the source tree of a revision
#[async_trait]
pub trait SourceProvider: Send + Sync {
    /// Writes the tree of `revision` into `dest`, which does not exist yet
    async fn checkout(&self, revision: &SourceRevision, dest: &Path) -> Result<(), BuildError>;
}

/// Copies a local directory snapshot, skipping version-control metadata
pub struct LocalDirectorySource {
    root: PathBuf,
}

impl LocalDirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl SourceProvider for LocalDirectorySource {
    async fn checkout(&self, revision: &SourceRevision, dest: &Path) -> Result<(), BuildError> {
        info!(
            "Copying source tree {} for revision {}",
            self.root.display(),
            revision
        );

        let root = self.root.clone();
        let dest = dest.to_owned();
        let copied = tokio::task::spawn_blocking(move || copy_tree(&root, &dest))
            .await
            .map_err(|e| BuildError::Checkout {
                revision: revision.id().to_string(),
                message: format!("copy task failed: {}", e),
            })?
            .map_err(|e| BuildError::Checkout {
                revision: revision.id().to_string(),
                message: e.to_string(),
            })?;

        debug!("Copied {} file(s) into workspace", copied);
        Ok(())
    }
}

fn copy_tree(src: &Path, dest: &Path) -> std::io::Result<usize> {
    if !src.is_dir() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("source directory {} not found", src.display()),
        ));
    }

    std::fs::create_dir_all(dest)?;
    let mut copied = 0;

    let walker = WalkDir::new(src)
        .min_depth(1)
        .into_iter()
        .filter_entry(|entry| entry.file_name() != ".git");

    for entry in walker {
        let entry = entry.map_err(std::io::Error::other)?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(std::io::Error::other)?;
        let target = dest.join(relative);

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else if entry.file_type().is_file() {
            std::fs::copy(entry.path(), &target)?;
            copied += 1;
        }
    }

    Ok(copied)
}

/// Clones a git repository and checks out the exact revision
pub struct GitSource {
    repository_url: String,
}

impl GitSource {
    pub fn new(repository_url: impl Into<String>) -> Self {
        Self {
            repository_url: repository_url.into(),
        }
    }

    async fn git(&self, revision: &SourceRevision, args: &[&str]) -> Result<(), BuildError> {
        let output = Command::new("git")
            .args(args)
            .stdin(std::process::Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| BuildError::Checkout {
                revision: revision.id().to_string(),
                message: format!("failed to run git: {}", e),
            })?;

        if !output.status.success() {
            return Err(BuildError::Checkout {
                revision: revision.id().to_string(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl SourceProvider for GitSource {
    async fn checkout(&self, revision: &SourceRevision, dest: &Path) -> Result<(), BuildError> {
        info!("Cloning {} at {}", self.repository_url, revision);

        let dest_str = dest.to_string_lossy();
        self.git(
            revision,
            &[
                "clone",
                "--quiet",
                "--no-checkout",
                "--branch",
                revision.branch(),
                &self.repository_url,
                &dest_str,
            ],
        )
        .await?;

        self.git(
            revision,
            &["-C", &dest_str, "checkout", "--quiet", "--detach", revision.id()],
        )
        .await
    }
}
