//! Independent recognition rules
//!
//! A rule looks at one line and produces at most one event. Rules never see
//! each other's results and never fail: a capture that does not parse simply
//! means the rule does not fire.

use super::events::{IgnoreReason, LineEvent, Outcome, UnitId};
use regex::{Captures, Regex};

pub trait LineRule: Send + Sync {
    /// Short name used in trace output
    fn name(&self) -> &'static str;

    fn evaluate(&self, line: &str) -> Option<LineEvent>;
}

fn capture_u64(caps: &Captures<'_>, group: &str) -> Option<u64> {
    caps.name(group)?.as_str().trim().parse().ok()
}

fn capture_unit(caps: &Captures<'_>) -> Option<UnitId> {
    let id = caps.name("id")?.as_str().trim();
    if id.is_empty() {
        None
    } else {
        Some(UnitId::new(id))
    }
}

pub struct ArtifactRule {
    pattern: Regex,
}

impl ArtifactRule {
    pub fn new(pattern: Regex) -> Self {
        Self { pattern }
    }
}

impl LineRule for ArtifactRule {
    fn name(&self) -> &'static str {
        "artifact"
    }

    fn evaluate(&self, line: &str) -> Option<LineEvent> {
        let caps = self.pattern.captures(line)?;
        let path = caps.name("path")?.as_str().trim();
        if path.is_empty() {
            return None;
        }
        Some(LineEvent::ArtifactAnnounced {
            path: path.to_string(),
        })
    }
}

pub struct TotalRule {
    pattern: Regex,
}

impl TotalRule {
    pub fn new(pattern: Regex) -> Self {
        Self { pattern }
    }
}

impl LineRule for TotalRule {
    fn name(&self) -> &'static str {
        "total"
    }

    fn evaluate(&self, line: &str) -> Option<LineEvent> {
        let caps = self.pattern.captures(line)?;
        Some(LineEvent::TotalAnnounced {
            total: capture_u64(&caps, "total")?,
        })
    }
}

pub struct GroupProgressRule {
    pattern: Regex,
}

impl GroupProgressRule {
    pub fn new(pattern: Regex) -> Self {
        Self { pattern }
    }
}

impl LineRule for GroupProgressRule {
    fn name(&self) -> &'static str {
        "group_progress"
    }

    fn evaluate(&self, line: &str) -> Option<LineEvent> {
        let caps = self.pattern.captures(line)?;
        Some(LineEvent::GroupProgress {
            index: capture_u64(&caps, "index")?,
            total: capture_u64(&caps, "total")?,
        })
    }
}

/// Recognizes per-unit result lines.
///
/// After the prefix matches, the earliest occurrence of either outcome token
/// decides the outcome. A prefix with neither token following it is reported
/// as unmatched.
pub struct ResultRule {
    pattern: Regex,
    success_token: String,
    failure_token: String,
}

impl ResultRule {
    pub fn new(pattern: Regex, success_token: String, failure_token: String) -> Self {
        Self {
            pattern,
            success_token,
            failure_token,
        }
    }

    fn outcome_in(&self, rest: &str) -> Option<Outcome> {
        let success = rest.find(&self.success_token);
        let failure = rest.find(&self.failure_token);
        match (success, failure) {
            (Some(s), Some(f)) if f < s => Some(Outcome::Failure),
            (Some(_), _) => Some(Outcome::Success),
            (None, Some(_)) => Some(Outcome::Failure),
            (None, None) => None,
        }
    }
}

impl LineRule for ResultRule {
    fn name(&self) -> &'static str {
        "result"
    }

    fn evaluate(&self, line: &str) -> Option<LineEvent> {
        let caps = self.pattern.captures(line)?;
        let unit = capture_unit(&caps)?;
        let end = caps.get(0)?.end();
        match self.outcome_in(&line[end..]) {
            Some(outcome) => Some(LineEvent::Resolved { unit, outcome }),
            None => Some(LineEvent::UnmatchedResult { unit }),
        }
    }
}

/// Per-unit ignore rule; the reason is fixed per instance
pub struct IgnoreRule {
    pattern: Regex,
    reason: IgnoreReason,
    name: &'static str,
}

impl IgnoreRule {
    pub fn explicit_skip(pattern: Regex) -> Self {
        Self {
            pattern,
            reason: IgnoreReason::ExplicitSkip,
            name: "explicit_skip",
        }
    }

    pub fn marker(pattern: Regex) -> Self {
        Self {
            pattern,
            reason: IgnoreReason::Marker,
            name: "ignore_marker",
        }
    }
}

impl LineRule for IgnoreRule {
    fn name(&self) -> &'static str {
        self.name
    }

    fn evaluate(&self, line: &str) -> Option<LineEvent> {
        let caps = self.pattern.captures(line)?;
        Some(LineEvent::Ignored {
            unit: capture_unit(&caps)?,
            reason: self.reason,
        })
    }
}

pub struct StartRule {
    pattern: Regex,
}

impl StartRule {
    pub fn new(pattern: Regex) -> Self {
        Self { pattern }
    }
}

impl LineRule for StartRule {
    fn name(&self) -> &'static str {
        "start"
    }

    fn evaluate(&self, line: &str) -> Option<LineEvent> {
        let caps = self.pattern.captures(line)?;
        Some(LineEvent::Started {
            unit: capture_unit(&caps)?,
        })
    }
}
