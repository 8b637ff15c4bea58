//! The line consumer trait

use super::types::StreamSource;
use async_trait::async_trait;

/// Receives every complete line of one stream, in arrival order.
///
/// A consumer is owned by exactly one drain task, which hands it back once the
/// stream closes, so implementations hold plain mutable state.
#[async_trait]
pub trait LineConsumer: Send {
    /// Handle one complete, escape-stripped line
    async fn consume_line(&mut self, line: &str, source: StreamSource);

    /// Called once after the final line of the stream
    async fn on_close(&mut self, _source: StreamSource) {}
}

/// Consumer that keeps every line
#[cfg(test)]
#[derive(Debug, Default)]
pub struct CollectingConsumer {
    pub lines: Vec<(StreamSource, String)>,
    pub closed: bool,
}

#[cfg(test)]
#[async_trait]
impl LineConsumer for CollectingConsumer {
    async fn consume_line(&mut self, line: &str, source: StreamSource) {
        self.lines.push((source, line.to_string()));
    }

    async fn on_close(&mut self, _source: StreamSource) {
        self.closed = true;
    }
}
