//! Cumulative per-run counters

use crate::classify::Outcome;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Counters {
    /// Announced number of units; only ever raised
    pub total: u64,
    pub processed: u64,
    pub success: u64,
    pub failed: u64,
    pub ignored: u64,
    /// Result-shaped lines carrying neither outcome literal; diagnostic only
    #[serde(default)]
    pub unmatched_results: u64,
}

/// The part of [`Counters`] that decides whether a snapshot is new
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature {
    pub processed: u64,
    pub success: u64,
    pub failed: u64,
    pub ignored: u64,
}

impl Counters {
    /// Raise `total` to `candidate` if larger. Returns whether it changed.
    pub fn raise_total(&mut self, candidate: u64) -> bool {
        if candidate > self.total {
            self.total = candidate;
            true
        } else {
            false
        }
    }

    pub fn record(&mut self, outcome: Outcome) {
        self.processed = self.processed.saturating_add(1);
        let slot = match outcome {
            Outcome::Success => &mut self.success,
            Outcome::Failure => &mut self.failed,
            Outcome::Ignored => &mut self.ignored,
        };
        *slot = slot.saturating_add(1);
    }

    pub fn record_unmatched(&mut self) {
        self.unmatched_results = self.unmatched_results.saturating_add(1);
    }

    pub fn is_consistent(&self) -> bool {
        self.processed == self.success + self.failed + self.ignored
    }

    /// True when no field of `self` is below the same field of `earlier`
    pub fn dominates(&self, earlier: &Counters) -> bool {
        self.total >= earlier.total
            && self.processed >= earlier.processed
            && self.success >= earlier.success
            && self.failed >= earlier.failed
            && self.ignored >= earlier.ignored
            && self.unmatched_results >= earlier.unmatched_results
    }

    pub fn signature(&self) -> Signature {
        Signature {
            processed: self.processed,
            success: self.success,
            failed: self.failed,
            ignored: self.ignored,
        }
    }
}
