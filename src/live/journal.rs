//! Reconstructing counters from `live_events.jsonl`

use super::events::LiveEvent;
use crate::classify::Outcome;
use crate::error::{CrawlwatchError, ErrorCode, ErrorExt, Result};
use crate::progress::{Counters, StatusSnapshot};
use serde::Serialize;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplayScope {
    #[default]
    AllRuns,
    /// Only records after the last `run_started` marker
    LastRun,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JournalReplay {
    pub counters: Counters,
    /// Well-formed records folded
    pub records: usize,
    /// Lines that did not parse as a record
    pub malformed: usize,
    /// `run_started` markers seen in the whole journal
    pub runs: usize,
    pub last_snapshot: Option<StatusSnapshot>,
}

impl JournalReplay {
    fn fold(&mut self, event: LiveEvent, scope: ReplayScope) {
        if let LiveEvent::RunStarted { .. } = event {
            self.runs += 1;
            if scope == ReplayScope::LastRun {
                self.counters = Counters::default();
                self.records = 0;
                self.last_snapshot = None;
            }
        }
        self.records += 1;
        apply_event(&mut self.counters, &event);
        if let LiveEvent::Status(snapshot) = event {
            self.last_snapshot = Some(snapshot);
        }
    }
}

/// Fold one record into `counters`.
///
/// Resolutions come from `result`/`ignore` records; `total` and the
/// unmatched count come from the largest value any `status` record carried.
pub fn apply_event(counters: &mut Counters, event: &LiveEvent) {
    match event {
        LiveEvent::Result { outcome, .. } => counters.record(*outcome),
        LiveEvent::Ignore { .. } => counters.record(Outcome::Ignored),
        LiveEvent::Status(snapshot) => {
            counters.raise_total(snapshot.counters.total);
            counters.unmatched_results = counters
                .unmatched_results
                .max(snapshot.counters.unmatched_results);
        }
        LiveEvent::RunStarted { .. } | LiveEvent::Start { .. } => {}
    }
}

pub fn fold_events<'a>(events: impl IntoIterator<Item = &'a LiveEvent>) -> Counters {
    let mut counters = Counters::default();
    for event in events {
        apply_event(&mut counters, event);
    }
    counters
}

/// Replay journal text; blank lines are skipped, unparsable ones counted.
pub fn replay_str(content: &str, scope: ReplayScope) -> JournalReplay {
    let mut replay = JournalReplay::default();
    for (number, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<LiveEvent>(line) {
            Ok(event) => replay.fold(event, scope),
            Err(e) => {
                debug!("Skipping malformed journal line {}: {}", number + 1, e);
                replay.malformed += 1;
            }
        }
    }
    replay
}

pub async fn replay_journal(path: &Path, scope: ReplayScope) -> Result<JournalReplay> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(CrawlwatchError::storage_with_code(
                ErrorCode::STORAGE_NOT_FOUND,
                "event journal does not exist",
                Some(path.to_path_buf()),
            ))
        }
        Err(e) => return Err(e).to_storage_error(path, "read event journal"),
    };
    Ok(replay_str(&content, scope))
}
