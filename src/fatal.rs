//! Detection of systemic crawler failures
//!
//! A fatal signature means the crawl cannot make further progress (expired
//! login, a run of consecutive failures). It is raised once per run and is
//! distinct from the failure of a single unit.

use crate::classify::vocabulary::compile_pattern;
use crate::error::Result;
use crate::subprocess::streaming::StreamSource;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::error;

pub fn default_signatures() -> Vec<String> {
    vec![
        "登录失效".to_string(),
        r"(?i)more than \d+ consecutive failures".to_string(),
        r"连续\s*\d+\s*次.*失败".to_string(),
    ]
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FatalSignal {
    /// The signature that matched
    pub signature: String,
    pub line: String,
    pub stream: StreamSource,
    pub detected_at: DateTime<Utc>,
}

/// Shared detector; clones report into the same once-only signal.
#[derive(Clone)]
pub struct TerminalFailureDetector {
    signatures: Arc<Vec<Regex>>,
    signal: Arc<watch::Sender<Option<FatalSignal>>>,
}

impl TerminalFailureDetector {
    pub fn new(signatures: Vec<Regex>) -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            signatures: Arc::new(signatures),
            signal: Arc::new(tx),
        }
    }

    pub fn from_signatures(patterns: &[String]) -> Result<Self> {
        let compiled = patterns
            .iter()
            .map(|p| compile_pattern("fatal.signatures", p, &[]))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(compiled))
    }

    /// Check one line. Returns true only for the call that raised the signal.
    pub fn inspect(&self, line: &str, stream: StreamSource) -> bool {
        let Some(matched) = self.signatures.iter().find(|re| re.is_match(line)) else {
            return false;
        };

        let raised = self.signal.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(FatalSignal {
                signature: matched.as_str().to_string(),
                line: line.to_string(),
                stream,
                detected_at: Utc::now(),
            });
            true
        });

        if raised {
            error!("Fatal crawler failure on {}: {}", stream, line);
        }
        raised
    }

    pub fn signal(&self) -> Option<FatalSignal> {
        self.signal.borrow().clone()
    }

    pub fn is_raised(&self) -> bool {
        self.signal.borrow().is_some()
    }

    /// Receiver that changes once, when the signal is raised
    pub fn subscribe(&self) -> watch::Receiver<Option<FatalSignal>> {
        self.signal.subscribe()
    }
}

impl Default for TerminalFailureDetector {
    fn default() -> Self {
        match Self::from_signatures(&default_signatures()) {
            Ok(detector) => detector,
            Err(e) => {
                tracing::error!("Built-in fatal signatures failed to compile: {}", e);
                Self::new(Vec::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_signatures_match() {
        for line in [
            "[课程信息接口] 登录失效，请重新登录",
            "Aborting: more than 5 consecutive failures",
            "连续10次请求失败，停止爬取",
        ] {
            let detector = TerminalFailureDetector::default();
            assert!(detector.inspect(line, StreamSource::Stderr), "{}", line);
        }
    }

    #[test]
    fn test_signal_is_raised_once() {
        let detector = TerminalFailureDetector::default();
        let clone = detector.clone();

        assert!(detector.inspect("登录失效", StreamSource::Stderr));
        assert!(!clone.inspect("登录失效 again", StreamSource::Stdout));

        let signal = detector.signal().unwrap();
        assert_eq!(signal.line, "登录失效");
        assert_eq!(signal.stream, StreamSource::Stderr);
    }

    #[test]
    fn test_ordinary_failure_is_not_fatal() {
        let detector = TerminalFailureDetector::default();
        assert!(!detector.inspect("[3]:提取视频链接失败", StreamSource::Stdout));
        assert!(!detector.is_raised());
    }

    #[tokio::test]
    async fn test_subscriber_sees_signal() {
        let detector = TerminalFailureDetector::default();
        let mut rx = detector.subscribe();
        let task = tokio::spawn(async move {
            rx.wait_for(|s| s.is_some()).await.unwrap().clone()
        });

        detector.inspect("登录失效", StreamSource::Stderr);
        let signal = task.await.unwrap().unwrap();
        assert_eq!(signal.signature, "登录失效");
    }

    #[test]
    fn test_invalid_signature_is_rejected() {
        assert!(TerminalFailureDetector::from_signatures(&["(".to_string()]).is_err());
    }
}
