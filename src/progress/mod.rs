//! Unit tracking and cumulative progress

pub mod aggregator;
pub mod counters;
pub mod pipeline;
pub mod resolver;

#[cfg(test)]
mod tests;

pub use aggregator::{StatusAggregator, StatusSnapshot};
pub use counters::{Counters, Signature};
pub use pipeline::{PipelineSummary, ProgressPipeline};
pub use resolver::{PendingResolver, PendingUnit, UnitTransition};
