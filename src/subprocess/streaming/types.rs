//! Core types for streaming infrastructure

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stream source identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamSource {
    Stdout,
    Stderr,
}

impl fmt::Display for StreamSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamSource::Stdout => f.write_str("stdout"),
            StreamSource::Stderr => f.write_str("stderr"),
        }
    }
}

/// Escape-stripped text decoded from one raw chunk, plus the lines it completed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReassembledChunk {
    /// Text to append to the raw log; concatenating every chunk's text
    /// reproduces the stripped stream exactly
    pub text: String,
    /// Lines completed by this chunk, in arrival order, without terminators
    pub lines: Vec<String>,
}

/// Totals gathered while draining one stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainStats {
    pub bytes: u64,
    pub chunks: u64,
    pub lines: u64,
}
