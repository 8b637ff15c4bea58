//! Sinks for live progress

use super::events::LiveEvent;
use crate::error::{ErrorExt, Result};
use crate::layout::{self, OutputLayout};
use crate::progress::StatusSnapshot;
use anyhow::Context;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

/// Destination for live events and forwarded snapshots.
///
/// Callers log failures and carry on; a sink error never stops parsing.
#[async_trait]
pub trait LiveSink: Send + Sync {
    async fn publish_event(&self, event: &LiveEvent) -> anyhow::Result<()>;

    async fn publish_snapshot(&self, snapshot: &StatusSnapshot) -> anyhow::Result<()>;
}

/// Writes `live_status.json` and appends to `live_events.jsonl`.
///
/// Neither file is truncated when a reporter is opened.
pub struct FileLiveReporter {
    status_path: PathBuf,
    journal_path: PathBuf,
    journal: Mutex<File>,
}

impl FileLiveReporter {
    pub async fn open(status_path: PathBuf, journal_path: PathBuf) -> Result<Self> {
        if let Some(parent) = journal_path.parent() {
            fs::create_dir_all(parent)
                .await
                .to_storage_error(parent, "create journal directory")?;
        }
        let journal = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&journal_path)
            .await
            .to_storage_error(&journal_path, "open event journal")?;

        debug!("Live reporter journal at {}", journal_path.display());
        Ok(Self {
            status_path,
            journal_path,
            journal: Mutex::new(journal),
        })
    }

    pub async fn for_layout(layout: &OutputLayout) -> Result<Self> {
        Self::open(layout.live_status_path(), layout.live_events_path()).await
    }

    pub fn status_path(&self) -> &Path {
        &self.status_path
    }

    pub fn journal_path(&self) -> &Path {
        &self.journal_path
    }

    async fn append_record(&self, event: &LiveEvent) -> anyhow::Result<()> {
        let mut line = serde_json::to_string(event).context("Failed to serialize live event")?;
        line.push('\n');

        let mut journal = self.journal.lock().await;
        journal
            .write_all(line.as_bytes())
            .await
            .with_context(|| format!("Failed to append to {}", self.journal_path.display()))?;
        journal
            .flush()
            .await
            .context("Failed to flush event journal")?;
        Ok(())
    }
}

#[async_trait]
impl LiveSink for FileLiveReporter {
    async fn publish_event(&self, event: &LiveEvent) -> anyhow::Result<()> {
        self.append_record(event).await
    }

    async fn publish_snapshot(&self, snapshot: &StatusSnapshot) -> anyhow::Result<()> {
        let status = layout::write_json_atomic(&self.status_path, snapshot).await;
        let journal = self
            .append_record(&LiveEvent::Status(snapshot.clone()))
            .await;
        status.context("Failed to write live status")?;
        journal
    }
}

/// Keeps everything in memory, in publish order
#[derive(Default)]
pub struct MemoryLiveSink {
    records: Mutex<Vec<LiveEvent>>,
}

impl MemoryLiveSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every record, snapshots included, as a journal would hold them
    pub async fn records(&self) -> Vec<LiveEvent> {
        self.records.lock().await.clone()
    }

    pub async fn snapshots(&self) -> Vec<StatusSnapshot> {
        self.records
            .lock()
            .await
            .iter()
            .filter_map(|event| match event {
                LiveEvent::Status(snapshot) => Some(snapshot.clone()),
                _ => None,
            })
            .collect()
    }

    pub async fn latest_snapshot(&self) -> Option<StatusSnapshot> {
        self.snapshots().await.pop()
    }
}

#[async_trait]
impl LiveSink for MemoryLiveSink {
    async fn publish_event(&self, event: &LiveEvent) -> anyhow::Result<()> {
        self.records.lock().await.push(event.clone());
        Ok(())
    }

    async fn publish_snapshot(&self, snapshot: &StatusSnapshot) -> anyhow::Result<()> {
        self.records
            .lock()
            .await
            .push(LiveEvent::Status(snapshot.clone()));
        Ok(())
    }
}
