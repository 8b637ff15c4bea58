//! stderr consumer: fatal detection and first-error capture

use crate::fatal::TerminalFailureDetector;
use crate::subprocess::streaming::{LineConsumer, StreamSource};
use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

pub struct StderrMonitor {
    detector: TerminalFailureDetector,
    error_pattern: Regex,
    first_error: Option<String>,
}

impl StderrMonitor {
    pub fn new(detector: TerminalFailureDetector, error_pattern: Regex) -> Self {
        Self {
            detector,
            error_pattern,
            first_error: None,
        }
    }

    pub fn first_error(&self) -> Option<&str> {
        self.first_error.as_deref()
    }

    pub fn into_first_error(self) -> Option<String> {
        self.first_error
    }

    fn capture_error(&mut self, line: &str) {
        if self.first_error.is_some() {
            return;
        }
        if let Some(caps) = self.error_pattern.captures(line) {
            let message = caps
                .name("message")
                .map(|m| m.as_str().trim())
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| line.trim());
            self.first_error = Some(message.to_string());
        }
    }
}

#[async_trait]
impl LineConsumer for StderrMonitor {
    async fn consume_line(&mut self, line: &str, source: StreamSource) {
        debug!("crawler {}: {}", source, line);
        self.detector.inspect(line, source);
        self.capture_error(line);
    }
}
