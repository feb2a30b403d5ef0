//! Execution results for the Sitepipe runner
//!
//! These types only exist at runtime while a build phase executes.
//! They are not persisted or sent over the network.

use sitepipe_core::domain::log::LogEntry;

/// Result of running a command sequence in a build environment
#[derive(Debug)]
pub enum ExecutionResult {
    /// Every command exited with code 0
    Success { logs: Vec<LogEntry> },
    /// A command exited non-zero; later commands did not run
    Failure {
        command: String,
        exit_code: i32,
        logs: Vec<LogEntry>,
    },
    /// The time bound elapsed while `command` was running
    Timeout { command: String, logs: Vec<LogEntry> },
}

impl ExecutionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionResult::Success { .. })
    }

    /// Exit code in shell convention (124 for timeouts)
    pub fn exit_code(&self) -> i32 {
        match self {
            ExecutionResult::Success { .. } => 0,
            ExecutionResult::Failure { exit_code, .. } => *exit_code,
            ExecutionResult::Timeout { .. } => 124,
        }
    }

    /// Get logs from the result
    pub fn logs(&self) -> &[LogEntry] {
        match self {
            ExecutionResult::Success { logs } => logs,
            ExecutionResult::Failure { logs, .. } => logs,
            ExecutionResult::Timeout { logs, .. } => logs,
        }
    }

    pub fn into_logs(self) -> Vec<LogEntry> {
        match self {
            ExecutionResult::Success { logs } => logs,
            ExecutionResult::Failure { logs, .. } => logs,
            ExecutionResult::Timeout { logs, .. } => logs,
        }
    }
}
