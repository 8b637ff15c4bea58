//! Folding unit transitions into counters and deduplicated snapshots

use super::counters::{Counters, Signature};
use super::resolver::UnitTransition;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Immutable copy of the counters at one moment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    #[serde(flatten)]
    pub counters: Counters,
    pub updated_at: DateTime<Utc>,
}

impl StatusSnapshot {
    pub fn new(counters: Counters) -> Self {
        Self {
            counters,
            updated_at: Utc::now(),
        }
    }
}

#[derive(Debug, Default)]
pub struct StatusAggregator {
    counters: Counters,
    last_forwarded: Option<Counters>,
}

impl StatusAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counters(&self) -> Counters {
        self.counters
    }

    /// Apply a transition; only resolutions touch the counters.
    pub fn apply(&mut self, transition: &UnitTransition) {
        if let UnitTransition::Resolved { outcome, .. } = transition {
            self.counters.record(*outcome);
        }
    }

    pub fn raise_total(&mut self, total: u64) -> bool {
        self.counters.raise_total(total)
    }

    pub fn record_unmatched(&mut self) {
        self.counters.record_unmatched();
    }

    /// Snapshot to forward after a change, if any.
    ///
    /// The first snapshot of a run is always returned. After that a snapshot
    /// is returned only when its signature differs from the last forwarded one.
    pub fn take_snapshot(&mut self) -> Option<StatusSnapshot> {
        let forward = match &self.last_forwarded {
            None => true,
            Some(last) => last.signature() != self.signature(),
        };
        self.forward_if(forward)
    }

    /// Closing snapshot: returned when any counter moved since the last one,
    /// so a late total or unmatched count is still published.
    pub fn take_final_snapshot(&mut self) -> Option<StatusSnapshot> {
        let forward = self.last_forwarded != Some(self.counters);
        self.forward_if(forward)
    }

    pub fn last_forwarded(&self) -> Option<Counters> {
        self.last_forwarded
    }

    fn signature(&self) -> Signature {
        self.counters.signature()
    }

    fn forward_if(&mut self, forward: bool) -> Option<StatusSnapshot> {
        if !forward {
            return None;
        }
        self.last_forwarded = Some(self.counters);
        Some(StatusSnapshot::new(self.counters))
    }
}
