//! Sitepipe Runner
//!
//! The build stage of the deployment pipeline.
//!
//! Architecture:
//! - Profile: which commands run in which phase, with what environment and limits
//! - Source: checks a revision out into an isolated workspace
//! - Environment: executes command sequences and captures their logs
//! - Services: the build service turning a revision into a site artifact,
//!   and the log buffer collecting build output for the orchestrator
//!
//! A build either returns a complete [`BuildArtifact`] or an error; partial
//! output never leaves this crate.
//!
//! [`BuildArtifact`]: sitepipe_core::domain::artifact::BuildArtifact

pub mod environment;
pub mod error;
pub mod execution;
pub mod profile;
pub mod service;
pub mod source;

pub use environment::{BuildEnvironment, ProcessEnvironment};
pub use error::{BuildError, EnvironmentError};
pub use execution::ExecutionResult;
pub use profile::{BuildPhase, BuildProfile, ComputeProfile};
pub use service::{BuildService, InMemoryLogBuffer, LogBufferService, StandardBuildService};
pub use source::{GitSource, LocalDirectorySource, SourceProvider};
