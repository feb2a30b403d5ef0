//! Build environments
//!
//! Handles command execution for a build:
//! - Running each command of a sequence in the working tree
//! - Capturing stdout/stderr as log entries
//! - Stopping at the first non-zero exit
//! - Killing a command, and anything it started, once the time bound passes
//!
//! The bound covers reading the output streams as well as the exit, so a
//! background process holding a pipe open cannot extend a build.

use async_trait::async_trait;
use sitepipe_core::domain::log::{LogEntry, LogLevel};
use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::time::{Instant, timeout};
use tracing::{debug, info, warn};

use crate::error::EnvironmentError;
use crate::execution::ExecutionResult;

/// Executes build command sequences
#[async_trait]
pub trait BuildEnvironment: Send + Sync {
    /// Runs `commands` in order inside `working_tree`
    ///
    /// The whole sequence must finish within `time_limit`. Execution stops at
    /// the first command that exits non-zero.
    async fn execute(
        &self,
        commands: &[String],
        env_vars: &HashMap<String, String>,
        working_tree: &Path,
        time_limit: Duration,
    ) -> Result<ExecutionResult, EnvironmentError>;
}

/// Runs commands as local `sh -c` processes with a cleared environment
pub struct ProcessEnvironment {
    shell: String,
    /// Host variables passed through to commands (e.g. PATH)
    inherited: Vec<String>,
}

impl ProcessEnvironment {
    pub fn new() -> Self {
        Self {
            shell: "sh".to_string(),
            inherited: vec!["PATH".to_string(), "HOME".to_string(), "LANG".to_string()],
        }
    }

    /// Adds a host variable that commands may see
    pub fn inherit(mut self, name: impl Into<String>) -> Self {
        self.inherited.push(name.into());
        self
    }

    fn command(
        &self,
        line: &str,
        env_vars: &HashMap<String, String>,
        working_tree: &Path,
    ) -> Command {
        let mut command = Command::new(&self.shell);
        command
            .arg("-c")
            .arg(line)
            .current_dir(working_tree)
            .env_clear()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        for name in &self.inherited {
            if let Ok(value) = std::env::var(name) {
                command.env(name, value);
            }
        }
        command.envs(env_vars);
        command
    }
}

impl Default for ProcessEnvironment {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BuildEnvironment for ProcessEnvironment {
    async fn execute(
        &self,
        commands: &[String],
        env_vars: &HashMap<String, String>,
        working_tree: &Path,
        time_limit: Duration,
    ) -> Result<ExecutionResult, EnvironmentError> {
        if !working_tree.is_dir() {
            return Err(EnvironmentError::MissingWorkingTree(
                working_tree.display().to_string(),
            ));
        }

        let deadline = Instant::now() + time_limit;
        let mut logs = Vec::new();

        for line in commands {
            logs.push(LogEntry::info(format!("$ {}", line)));
            debug!("Executing build command: {}", line);

            let mut child = self
                .command(line, env_vars, working_tree)
                .spawn()
                .map_err(|source| EnvironmentError::Spawn {
                    command: line.clone(),
                    source,
                })?;

            // Leader of its own process group
            let group = child.id();
            let mut stdout = tokio::spawn(read_lines(child.stdout.take(), LogLevel::Info));
            let mut stderr = tokio::spawn(read_lines(child.stderr.take(), LogLevel::Warning));

            let remaining = deadline.saturating_duration_since(Instant::now());
            let finished = timeout(remaining, async {
                let status = child.wait().await?;
                let out = (&mut stdout).await.unwrap_or_default();
                let err = (&mut stderr).await.unwrap_or_default();
                Ok::<_, std::io::Error>((status, out, err))
            })
            .await;

            let status = match finished {
                Ok(Ok((status, out, err))) => {
                    logs.extend(out);
                    logs.extend(err);
                    status
                }
                Ok(Err(source)) => {
                    kill_group(group);
                    stdout.abort();
                    stderr.abort();
                    return Err(EnvironmentError::Wait {
                        command: line.clone(),
                        source,
                    });
                }
                Err(_) => {
                    warn!("Build command timed out: {}", line);
                    kill_group(group);
                    child.kill().await.ok();
                    stdout.abort();
                    stderr.abort();
                    logs.push(LogEntry::error(format!(
                        "Command timed out after {}s: {}",
                        time_limit.as_secs(),
                        line
                    )));
                    return Ok(ExecutionResult::Timeout {
                        command: line.clone(),
                        logs,
                    });
                }
            };

            if !status.success() {
                // Killed by a signal has no code
                let exit_code = status.code().unwrap_or(-1);
                info!("Build command exited with code {}: {}", exit_code, line);
                logs.push(LogEntry::error(format!(
                    "Command exited with code {}: {}",
                    exit_code, line
                )));
                return Ok(ExecutionResult::Failure {
                    command: line.clone(),
                    exit_code,
                    logs,
                });
            }
        }

        Ok(ExecutionResult::Success { logs })
    }
}

/// Kills every process left in the command's group
fn kill_group(group: Option<u32>) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{Signal, killpg};
        use nix::unistd::Pid;

        if let Some(pid) = group.and_then(|id| i32::try_from(id).ok()) {
            if let Err(e) = killpg(Pid::from_raw(pid), Signal::SIGKILL) {
                debug!("Process group {} already gone: {}", pid, e);
            }
        }
    }
    #[cfg(not(unix))]
    let _ = group;
}

async fn read_lines<R>(stream: Option<R>, level: LogLevel) -> Vec<LogEntry>
where
    R: AsyncRead + Unpin,
{
    let mut entries = Vec::new();
    if let Some(stream) = stream {
        let mut lines = BufReader::new(stream).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            entries.push(LogEntry::new(level, line));
        }
    }
    entries
}
