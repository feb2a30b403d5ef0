//! Log Repository
//!
//! Build and publish log entries of each run, in arrival order.

use async_trait::async_trait;
use sitepipe_core::domain::log::LogEntry;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

const MAX_MESSAGE_LENGTH: usize = 10_000;

#[async_trait]
pub trait LogRepository: Send + Sync {
    /// Appends entries to a run's log
    async fn append(&self, run_id: Uuid, entries: Vec<LogEntry>);

    async fn find_by_run(&self, run_id: Uuid) -> Vec<LogEntry>;
}

/// Run logs kept in process memory
#[derive(Default)]
pub struct InMemoryLogRepository {
    logs: RwLock<HashMap<Uuid, Vec<LogEntry>>>,
}

impl InMemoryLogRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LogRepository for InMemoryLogRepository {
    async fn append(&self, run_id: Uuid, entries: Vec<LogEntry>) {
        if entries.is_empty() {
            return;
        }

        let mut logs = self.logs.write().await;
        let log = logs.entry(run_id).or_default();
        log.extend(entries.into_iter().map(truncate));
        tracing::debug!("Run {} has {} log entries", run_id, log.len());
    }

    async fn find_by_run(&self, run_id: Uuid) -> Vec<LogEntry> {
        self.logs
            .read()
            .await
            .get(&run_id)
            .cloned()
            .unwrap_or_default()
    }
}

/// Caps overly long lines such as minified output echoed by a build tool
fn truncate(mut entry: LogEntry) -> LogEntry {
    if entry.message.len() > MAX_MESSAGE_LENGTH {
        let mut cut = MAX_MESSAGE_LENGTH;
        while !entry.message.is_char_boundary(cut) {
            cut -= 1;
        }
        entry.message.truncate(cut);
        entry.message.push_str("…");
    }
    entry
}
