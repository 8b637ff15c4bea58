//! Records published to live observers

use crate::classify::{IgnoreReason, Outcome, UnitId};
use crate::progress::{StatusSnapshot, UnitTransition};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One line of `live_events.jsonl`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LiveEvent {
    /// Separates runs appended to the same journal
    RunStarted {
        run_id: Uuid,
        timestamp: DateTime<Utc>,
    },
    Start {
        unit_id: Option<UnitId>,
        timestamp: DateTime<Utc>,
    },
    Result {
        unit_id: Option<UnitId>,
        outcome: Outcome,
        timestamp: DateTime<Utc>,
    },
    Ignore {
        unit_id: Option<UnitId>,
        reason: IgnoreReason,
        timestamp: DateTime<Utc>,
    },
    Status(StatusSnapshot),
}

impl LiveEvent {
    pub fn run_started(run_id: Uuid) -> Self {
        Self::RunStarted {
            run_id,
            timestamp: Utc::now(),
        }
    }

    pub fn from_transition(transition: &UnitTransition) -> Self {
        let timestamp = Utc::now();
        match transition {
            UnitTransition::Started { unit } => Self::Start {
                unit_id: unit.clone(),
                timestamp,
            },
            UnitTransition::Resolved {
                unit,
                outcome: Outcome::Ignored,
                reason,
            } => Self::Ignore {
                unit_id: unit.clone(),
                reason: reason.unwrap_or(IgnoreReason::Marker),
                timestamp,
            },
            UnitTransition::Resolved { unit, outcome, .. } => Self::Result {
                unit_id: unit.clone(),
                outcome: *outcome,
                timestamp,
            },
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::RunStarted { .. } => "run_started",
            Self::Start { .. } => "start",
            Self::Result { .. } => "result",
            Self::Ignore { .. } => "ignore",
            Self::Status(_) => "status",
        }
    }
}
