//! Build artifact and manifest types

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};

/// Files of a site keyed by their relative path
pub type FileTree = BTreeMap<String, Vec<u8>>;

/// Set of relative file paths making up a site
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest(BTreeSet<String>);

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>) -> bool {
        self.0.insert(path.into())
    }

    pub fn remove(&mut self, path: &str) -> bool {
        self.0.remove(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.0.contains(path)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Paths present here but absent from `other`
    pub fn missing_from<'a>(&'a self, other: &'a Manifest) -> impl Iterator<Item = &'a str> {
        self.0.difference(&other.0).map(String::as_str)
    }

    /// Paths present in both manifests
    pub fn intersection(&self, other: &Manifest) -> Manifest {
        Manifest(self.0.intersection(&other.0).cloned().collect())
    }

    pub fn is_superset(&self, other: &Manifest) -> bool {
        self.0.is_superset(&other.0)
    }
}

impl<S: Into<String>> FromIterator<S> for Manifest {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Manifest(iter.into_iter().map(Into::into).collect())
    }
}

/// Immutable output of a successful build
///
/// The id is derived from the content, so two builds producing the same
/// files share an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildArtifact {
    id: String,
    revision_id: String,
    manifest: Manifest,
    #[serde(skip)]
    files: FileTree,
}

impl BuildArtifact {
    /// Assembles an artifact from a file tree, validating every path
    pub fn from_files(revision_id: impl Into<String>, files: FileTree) -> Result<Self, InvalidPath> {
        for path in files.keys() {
            validate_relative_path(path)?;
        }

        let manifest = files.keys().cloned().collect();
        let id = content_address(&files);

        Ok(Self {
            id,
            revision_id: revision_id.into(),
            manifest,
            files,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn revision_id(&self) -> &str {
        &self.revision_id
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn files(&self) -> &FileTree {
        &self.files
    }

    pub fn file(&self, path: &str) -> Option<&[u8]> {
        self.files.get(path).map(Vec::as_slice)
    }

    /// Total payload size in bytes
    pub fn size(&self) -> usize {
        self.files.values().map(Vec::len).sum()
    }
}

/// Computes the sha256 content address of a file tree
///
/// Path and length prefixes keep `{"a": "bc"}` and `{"ab": "c"}` distinct.
pub fn content_address(files: &FileTree) -> String {
    let mut hasher = Sha256::new();
    for (path, bytes) in files {
        hasher.update((path.len() as u64).to_be_bytes());
        hasher.update(path.as_bytes());
        hasher.update((bytes.len() as u64).to_be_bytes());
        hasher.update(bytes);
    }
    hex::encode(hasher.finalize())
}

/// Path rejected from a manifest
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid artifact path '{path}': {reason}")]
pub struct InvalidPath {
    pub path: String,
    pub reason: &'static str,
}

/// Checks that `path` is a `/`-separated relative path that stays inside its root
pub fn validate_relative_path(path: &str) -> Result<(), InvalidPath> {
    let reject = |reason| {
        Err(InvalidPath {
            path: path.to_string(),
            reason,
        })
    };

    if path.is_empty() {
        return reject("empty path");
    }
    if path.starts_with('/') {
        return reject("absolute path");
    }
    if path.contains('\\') {
        return reject("backslash separator");
    }
    for segment in path.split('/') {
        match segment {
            "" => return reject("empty segment"),
            "." | ".." => return reject("relative segment"),
            _ => {}
        }
    }
    Ok(())
}
