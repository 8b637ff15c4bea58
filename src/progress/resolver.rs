//! At-most-one-in-flight tracking of the current unit

use crate::classify::{IgnoreReason, Outcome, UnitId};
use tracing::debug;

/// The unit currently being worked on; `unit` is `None` when a batch
/// progress line started it without naming it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingUnit {
    pub unit: Option<UnitId>,
}

/// A change to unit state that observers and counters care about
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitTransition {
    Started {
        unit: Option<UnitId>,
    },
    /// `reason` is set exactly when `outcome` is [`Outcome::Ignored`]
    Resolved {
        unit: Option<UnitId>,
        outcome: Outcome,
        reason: Option<IgnoreReason>,
    },
}

impl UnitTransition {
    fn abandoned(unit: Option<UnitId>) -> Self {
        Self::Resolved {
            unit,
            outcome: Outcome::Ignored,
            reason: Some(IgnoreReason::Abandoned),
        }
    }
}

#[derive(Debug, Default)]
pub struct PendingResolver {
    pending: Option<PendingUnit>,
}

impl PendingResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> Option<&PendingUnit> {
        self.pending.as_ref()
    }

    /// Begin `unit`. A unit already pending is resolved as abandoned first.
    pub fn mark_start(&mut self, unit: Option<UnitId>) -> Vec<UnitTransition> {
        let mut transitions = Vec::with_capacity(2);
        if let Some(abandoned) = self.abandon_pending() {
            transitions.push(abandoned);
        }
        self.pending = Some(PendingUnit { unit: unit.clone() });
        transitions.push(UnitTransition::Started { unit });
        transitions
    }

    /// Resolve `unit`, whether or not it is the pending one.
    pub fn mark_resolved(&mut self, unit: UnitId, outcome: Outcome) -> UnitTransition {
        let reason = (outcome == Outcome::Ignored).then_some(IgnoreReason::Marker);
        self.resolve(unit, outcome, reason)
    }

    pub fn mark_ignored(&mut self, unit: UnitId, reason: IgnoreReason) -> UnitTransition {
        self.resolve(unit, Outcome::Ignored, Some(reason))
    }

    /// Force-resolve whatever is pending as abandoned
    pub fn abandon_pending(&mut self) -> Option<UnitTransition> {
        let pending = self.pending.take()?;
        debug!("Unit {:?} abandoned without a result", pending.unit);
        Some(UnitTransition::abandoned(pending.unit))
    }

    /// End-of-stream flush. Calling it again yields nothing.
    pub fn flush(&mut self) -> Option<UnitTransition> {
        self.abandon_pending()
    }

    fn resolve(
        &mut self,
        unit: UnitId,
        outcome: Outcome,
        reason: Option<IgnoreReason>,
    ) -> UnitTransition {
        if let Some(pending) = self.pending.take() {
            if let Some(expected) = pending.unit.as_ref().filter(|p| **p != unit) {
                debug!("Result for {} while {} was pending", unit, expected);
            }
        }
        UnitTransition::Resolved {
            unit: Some(unit),
            outcome,
            reason,
        }
    }
}
