//! Semantic events recognized in crawler output

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier of one unit of crawl work
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(String);

impl UnitId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UnitId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Final disposition of a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure,
    Ignored,
}

/// Why a unit was counted as ignored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreReason {
    /// The crawler classified the unit as a content type it does not parse
    ExplicitSkip,
    /// The crawler printed its generic ignore marker
    Marker,
    /// The unit never resolved before the next one started or the stream ended
    Abandoned,
}

/// One event produced by a recognition rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEvent {
    ArtifactAnnounced { path: String },
    TotalAnnounced { total: u64 },
    GroupProgress { index: u64, total: u64 },
    Resolved { unit: UnitId, outcome: Outcome },
    Ignored { unit: UnitId, reason: IgnoreReason },
    /// A result-shaped line that carried neither outcome literal
    UnmatchedResult { unit: UnitId },
    Started { unit: UnitId },
}
