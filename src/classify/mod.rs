//! Line classification
//!
//! A [`Classifier`] runs a fixed, ordered list of [`LineRule`]s over each
//! complete line and concatenates whatever they produce. Several rules may
//! fire for the same line; lines no rule recognizes produce nothing.

pub mod events;
pub mod rules;
pub mod vocabulary;


pub use events::{IgnoreReason, LineEvent, Outcome, UnitId};
pub use rules::LineRule;
pub use vocabulary::{CompiledVocabulary, Vocabulary};

use crate::error::Result;
use rules::{ArtifactRule, GroupProgressRule, IgnoreRule, ResultRule, StartRule, TotalRule};
use tracing::trace;

pub struct Classifier {
    rules: Vec<Box<dyn LineRule>>,
}

impl Classifier {
    /// Build the standard rule list from a vocabulary.
    ///
    /// Order: artifact, total, group progress, result, explicit skip, ignore
    /// marker, start.
    pub fn from_vocabulary(vocabulary: &Vocabulary) -> Result<Self> {
        Ok(Self::from_compiled(vocabulary.compile()?))
    }

    pub fn from_compiled(v: CompiledVocabulary) -> Self {
        let rules: Vec<Box<dyn LineRule>> = vec![
            Box::new(ArtifactRule::new(v.artifact_export)),
            Box::new(TotalRule::new(v.total_announcement)),
            Box::new(GroupProgressRule::new(v.group_progress)),
            Box::new(ResultRule::new(
                v.unit_result,
                v.success_token,
                v.failure_token,
            )),
            Box::new(IgnoreRule::explicit_skip(v.explicit_skip)),
            Box::new(IgnoreRule::marker(v.ignore_marker)),
            Box::new(StartRule::new(v.unit_start)),
        ];
        Self { rules }
    }

    pub fn classify(&self, line: &str) -> Vec<LineEvent> {
        let mut events = Vec::new();
        for rule in &self.rules {
            if let Some(event) = rule.evaluate(line) {
                trace!("rule {} matched: {:?}", rule.name(), event);
                events.push(event);
            }
        }
        events
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }
}

impl Default for Classifier {
    fn default() -> Self {
        match Vocabulary::default().compile() {
            Ok(compiled) => Self::from_compiled(compiled),
            Err(e) => {
                tracing::error!("Built-in vocabulary failed to compile: {}", e);
                Self { rules: Vec::new() }
            }
        }
    }
}
