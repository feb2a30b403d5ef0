//! Error types for the build stage

use std::time::Duration;

use sitepipe_core::domain::artifact::InvalidPath;
use thiserror::Error;

use crate::profile::BuildPhase;

/// Errors that end a build without an artifact
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("source checkout failed for {revision}: {message}")]
    Checkout { revision: String, message: String },

    #[error("{phase} command `{command}` exited with code {exit_code}")]
    CommandFailed {
        phase: BuildPhase,
        command: String,
        exit_code: i32,
    },

    #[error("build exceeded timeout of {}s", limit.as_secs())]
    Timeout { limit: Duration },

    #[error("build output directory '{0}' is missing or empty")]
    EmptyOutput(String),

    #[error("invalid build output: {0}")]
    InvalidOutput(#[from] InvalidPath),

    #[error("build environment error: {0}")]
    Environment(#[from] EnvironmentError),

    #[error("workspace I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by a build environment before a command could report an exit code
#[derive(Debug, Error)]
pub enum EnvironmentError {
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed waiting for `{command}`: {source}")]
    Wait {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("working tree {0} does not exist")]
    MissingWorkingTree(String),
}
