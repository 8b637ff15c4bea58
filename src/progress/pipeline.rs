//! The stdout parsing pipeline of one run

use super::aggregator::{StatusAggregator, StatusSnapshot};
use super::counters::Counters;
use super::resolver::{PendingResolver, PendingUnit, UnitTransition};
use crate::artifact::ArtifactLocator;
use crate::classify::{Classifier, LineEvent};
use crate::fatal::TerminalFailureDetector;
use crate::live::{LiveEvent, LiveSink};
use crate::subprocess::streaming::{LineConsumer, StreamSource};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Everything the supervisor needs once stdout has closed
#[derive(Debug, Clone)]
pub struct PipelineSummary {
    pub counters: Counters,
    pub artifacts: ArtifactLocator,
    pub lines: u64,
}

/// Sequential fold of classified lines into unit state, counters and live
/// output. Owned by the stdout drain for the length of a run.
pub struct ProgressPipeline {
    classifier: Arc<Classifier>,
    resolver: PendingResolver,
    aggregator: StatusAggregator,
    sink: Arc<dyn LiveSink>,
    artifacts: ArtifactLocator,
    fatal: Option<TerminalFailureDetector>,
    lines: u64,
    finished: bool,
}

impl ProgressPipeline {
    pub fn new(classifier: Arc<Classifier>, sink: Arc<dyn LiveSink>) -> Self {
        Self {
            classifier,
            resolver: PendingResolver::new(),
            aggregator: StatusAggregator::new(),
            sink,
            artifacts: ArtifactLocator::default(),
            fatal: None,
            lines: 0,
            finished: false,
        }
    }

    pub fn with_artifacts(mut self, artifacts: ArtifactLocator) -> Self {
        self.artifacts = artifacts;
        self
    }

    /// Also scan stdout lines for fatal signatures
    pub fn with_fatal_detector(mut self, detector: TerminalFailureDetector) -> Self {
        self.fatal = Some(detector);
        self
    }

    /// Mark the start of a run in the journal
    pub async fn begin(&self, run_id: Uuid) {
        self.emit(LiveEvent::run_started(run_id)).await;
    }

    pub fn counters(&self) -> Counters {
        self.aggregator.counters()
    }

    pub fn pending(&self) -> Option<&PendingUnit> {
        self.resolver.pending()
    }

    pub fn artifacts(&self) -> &ArtifactLocator {
        &self.artifacts
    }

    pub async fn process_line(&mut self, line: &str) {
        self.lines += 1;
        if let Some(detector) = &self.fatal {
            detector.inspect(line, StreamSource::Stdout);
        }
        let events = self.classifier.classify(line);
        if !events.is_empty() {
            debug!("{:?} <- {}", events, line);
        }
        for event in events {
            self.apply_event(event).await;
        }
    }

    pub async fn apply_event(&mut self, event: LineEvent) {
        match event {
            LineEvent::ArtifactAnnounced { path } => {
                self.artifacts.record(&path);
            }
            LineEvent::TotalAnnounced { total } => {
                self.aggregator.raise_total(total);
                self.publish_snapshot().await;
            }
            LineEvent::GroupProgress { total, .. } => {
                if let Some(abandoned) = self.resolver.abandon_pending() {
                    self.apply_transition(abandoned).await;
                }
                self.aggregator.raise_total(total);
                for transition in self.resolver.mark_start(None) {
                    self.apply_transition(transition).await;
                }
            }
            LineEvent::Resolved { unit, outcome } => {
                let transition = self.resolver.mark_resolved(unit, outcome);
                self.apply_transition(transition).await;
            }
            LineEvent::Ignored { unit, reason } => {
                let transition = self.resolver.mark_ignored(unit, reason);
                self.apply_transition(transition).await;
            }
            LineEvent::UnmatchedResult { unit } => {
                debug!("Result line for {} carried no outcome", unit);
                self.aggregator.record_unmatched();
            }
            LineEvent::Started { unit } => {
                for transition in self.resolver.mark_start(Some(unit)) {
                    self.apply_transition(transition).await;
                }
            }
        }
    }

    /// Resolve any pending unit and publish the closing snapshot.
    ///
    /// Safe to call more than once; only the first call does anything.
    pub async fn finish(&mut self) -> PipelineSummary {
        if !self.finished {
            self.finished = true;
            if let Some(abandoned) = self.resolver.flush() {
                self.apply_transition(abandoned).await;
            }
            if let Some(snapshot) = self.aggregator.take_final_snapshot() {
                self.forward(&snapshot).await;
            }
        }
        self.summary()
    }

    pub fn summary(&self) -> PipelineSummary {
        PipelineSummary {
            counters: self.aggregator.counters(),
            artifacts: self.artifacts.clone(),
            lines: self.lines,
        }
    }

    async fn apply_transition(&mut self, transition: UnitTransition) {
        self.aggregator.apply(&transition);
        self.emit(LiveEvent::from_transition(&transition)).await;
        if matches!(transition, UnitTransition::Resolved { .. }) {
            self.publish_snapshot().await;
        }
    }

    async fn publish_snapshot(&mut self) {
        if let Some(snapshot) = self.aggregator.take_snapshot() {
            self.forward(&snapshot).await;
        }
    }

    async fn forward(&self, snapshot: &StatusSnapshot) {
        if let Err(e) = self.sink.publish_snapshot(snapshot).await {
            warn!("Failed to publish status snapshot: {:#}", e);
        }
    }

    async fn emit(&self, event: LiveEvent) {
        if let Err(e) = self.sink.publish_event(&event).await {
            warn!("Failed to publish {} event: {:#}", event.kind(), e);
        }
    }
}

#[async_trait]
impl LineConsumer for ProgressPipeline {
    async fn consume_line(&mut self, line: &str, _source: StreamSource) {
        self.process_line(line).await;
    }
}
