//! The record of one supervised run

use crate::artifact::ArtifactRecord;
use crate::classify::Outcome;
use crate::error::Result;
use crate::fatal::FatalSignal;
use crate::layout::{self, OutputLayout};
use crate::progress::Counters;
use crate::subprocess::ExitStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    Error,
}

/// Why the crawler stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    Exited,
    Cancelled,
    Fatal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    pub run_id: Uuid,
    pub status: RunStatus,
    /// `None` when the crawler never started
    pub termination: Option<Termination>,
    pub exit_status: Option<ExitStatus>,
    pub exit_code: Option<i32>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub log_path: PathBuf,
    /// Last artifact the crawler announced
    pub artifact_path: Option<PathBuf>,
    /// Archived copy of `artifact_path`
    pub archived_path: Option<PathBuf>,
    pub artifacts: Vec<ArtifactRecord>,
    pub counters: Counters,
    pub overall: Option<Outcome>,
    pub error_message: Option<String>,
    pub fatal_signal: Option<FatalSignal>,
}

/// Overall verdict from final counters.
///
/// Any success with no failure is a success and any failure with no success
/// is a failure. With neither, ignored units make the run ignored. A mix of
/// successes and failures counts as a success. Nothing resolved gives `None`.
pub fn overall_verdict(counters: &Counters) -> Option<Outcome> {
    match (counters.success, counters.failed, counters.ignored) {
        (s, 0, _) if s > 0 => Some(Outcome::Success),
        (0, f, _) if f > 0 => Some(Outcome::Failure),
        (0, 0, i) if i > 0 => Some(Outcome::Ignored),
        (s, _, _) if s > 0 => Some(Outcome::Success),
        _ => None,
    }
}

/// Success only for a clean exit: code 0, not cancelled, no fatal signal
pub fn run_status(
    termination: Option<Termination>,
    exit_code: Option<i32>,
    fatal: Option<&FatalSignal>,
) -> RunStatus {
    match (termination, exit_code, fatal) {
        (Some(Termination::Exited), Some(0), None) => RunStatus::Success,
        _ => RunStatus::Error,
    }
}

impl RunResult {
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }

    /// Exit code for a CLI wrapping this run
    pub fn process_exit_code(&self) -> i32 {
        match (self.termination, self.status) {
            (Some(Termination::Cancelled), _) => 130,
            (Some(Termination::Fatal), _) => 2,
            (_, RunStatus::Success) => 0,
            _ => 1,
        }
    }

    pub async fn persist(&self, layout: &OutputLayout) -> Result<()> {
        layout::write_json_atomic(&layout.last_run_path(), self).await
    }

    pub async fn load_last(layout: &OutputLayout) -> Result<Self> {
        layout::read_json(&layout.last_run_path()).await
    }
}
