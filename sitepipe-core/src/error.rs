//! Error kinds shared across Sitepipe stages

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Category of a pipeline failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    /// Malformed or unqualified trigger event
    InvalidTrigger,
    /// Build command exited non-zero, timed out or produced no output
    BuildFailure,
    /// File sync to the published set did not complete
    PublishFailure,
    /// Site configuration rejected at setup time
    ConfigurationError,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::InvalidTrigger => write!(f, "InvalidTrigger"),
            FailureKind::BuildFailure => write!(f, "BuildFailure"),
            FailureKind::PublishFailure => write!(f, "PublishFailure"),
            FailureKind::ConfigurationError => write!(f, "ConfigurationError"),
        }
    }
}

/// Reason attached to a failed pipeline run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl RunFailure {
    pub fn build(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::BuildFailure,
            message: message.into(),
        }
    }

    pub fn publish(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::PublishFailure,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for RunFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Configuration rejected before the pipeline starts
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("missing required option: {0}")]
    Missing(&'static str),

    #[error("invalid domain name '{domain}': {reason}")]
    InvalidDomain { domain: String, reason: String },

    #[error("invalid certificate ARN '{0}'")]
    InvalidCertificate(String),

    #[error("certificate {arn} is not valid for {hostname}")]
    CertificateMismatch { arn: String, hostname: String },

    #[error("minTTL ({min_ttl}s) must not exceed defaultTTL ({default_ttl}s)")]
    TtlOrder { min_ttl: u64, default_ttl: u64 },

    #[error("invalid value for {option}: {reason}")]
    InvalidValue { option: &'static str, reason: String },
}

impl ConfigError {
    pub fn kind(&self) -> FailureKind {
        FailureKind::ConfigurationError
    }
}

/// Result alias for configuration checks
pub type ConfigResult<T> = Result<T, ConfigError>;
