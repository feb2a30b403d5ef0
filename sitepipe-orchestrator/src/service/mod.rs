//! Service Module
//!
//! Business logic layer for the orchestrator.
//! Services coordinate the build and publish stages over the repositories.

pub mod orchestrator;
pub mod publish;

// Re-export for convenience
pub use orchestrator::{Orchestrator, OrchestratorDeps};
pub use publish::{PublishError, PublishReport, PublishService, PublishSettings};
