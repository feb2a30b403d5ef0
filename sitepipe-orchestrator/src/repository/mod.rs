//! Repository Module
//!
//! Data access layer for the orchestrator.
//! Each repository owns one kind of state: built artifacts, the published
//! site, run history and run logs.

pub mod artifact;
pub mod log;
pub mod run;
pub mod target;

// Re-export for convenience
pub use artifact::{ArtifactStore, FilesystemArtifactStore, InMemoryArtifactStore, StoreError};
pub use log::{InMemoryLogRepository, LogRepository};
pub use run::{InMemoryRunRepository, RunRepository, RunRepositoryError};
pub use target::{
    FilesystemPublishTarget, InMemoryPublishTarget, Origin, OriginObject, PublishTarget,
    PublishedVersion, TargetError,
};
