//! Chunk-to-line reassembly for child process output
//!
//! Pipe reads return arbitrary byte ranges: a read may end in the middle of a
//! line, of a multi-byte UTF-8 character, or of a terminal escape sequence.
//! [`LineReassembler`] carries each of those fragments over to the next chunk
//! so that every complete line is produced exactly once and the decoded text
//! handed to the raw log loses and duplicates nothing.

use super::types::ReassembledChunk;
use once_cell::sync::Lazy;
use regex::Regex;

/// Complete CSI sequences (colors, cursor movement, erase)
static CSI_SEQUENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\x1b\[[0-?]*[ -/]*[@-~]").unwrap_or_else(|e| panic!("invalid CSI pattern: {e}"))
});

/// A CSI sequence that has started but not yet reached its final byte
static PARTIAL_CSI: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\x1b(\[[0-?]*[ -/]*)?$").unwrap_or_else(|e| panic!("invalid CSI pattern: {e}"))
});

/// Remove terminal escape sequences from already-complete text
pub fn strip_ansi(text: &str) -> String {
    CSI_SEQUENCE.replace_all(text, "").into_owned()
}

#[derive(Debug, Default)]
pub struct LineReassembler {
    /// Trailing bytes of an incomplete UTF-8 character
    pending_bytes: Vec<u8>,
    /// Trailing start of an escape sequence not yet terminated
    pending_escape: String,
    /// Text after the last line terminator seen
    carry: String,
}

impl LineReassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one raw chunk; returns its stripped text and the lines it completed.
    pub fn push(&mut self, chunk: &[u8]) -> ReassembledChunk {
        let decoded = self.decode(chunk);

        let mut text = std::mem::take(&mut self.pending_escape);
        text.push_str(&decoded);

        if let Some(idx) = text.rfind('\x1b') {
            if PARTIAL_CSI.is_match(&text[idx..]) {
                self.pending_escape = text.split_off(idx);
            }
        }

        let text = strip_ansi(&text);
        let lines = self.split_lines(&text);
        ReassembledChunk { text, lines }
    }

    /// Flush whatever is held back at end of stream.
    ///
    /// Incomplete UTF-8 bytes are decoded lossily, a dangling escape prefix is
    /// passed through as text, and a non-empty unterminated line is returned as
    /// the final line.
    pub fn finish(&mut self) -> ReassembledChunk {
        let mut text = std::mem::take(&mut self.pending_escape);
        if !self.pending_bytes.is_empty() {
            let bytes = std::mem::take(&mut self.pending_bytes);
            text.push_str(&String::from_utf8_lossy(&bytes));
        }

        let mut lines = self.split_lines(&text);
        let last = std::mem::take(&mut self.carry);
        let last = last.strip_suffix('\r').unwrap_or(&last);
        if !last.is_empty() {
            lines.push(last.to_string());
        }
        ReassembledChunk { text, lines }
    }

    /// True when nothing is held back
    pub fn is_empty(&self) -> bool {
        self.pending_bytes.is_empty() && self.pending_escape.is_empty() && self.carry.is_empty()
    }

    fn decode(&mut self, chunk: &[u8]) -> String {
        self.pending_bytes.extend_from_slice(chunk);
        let bytes = std::mem::take(&mut self.pending_bytes);

        let mut out = String::with_capacity(bytes.len());
        let mut rest: &[u8] = &bytes;
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    break;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    out.push_str(&String::from_utf8_lossy(valid));
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                        None => {
                            self.pending_bytes = after.to_vec();
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    fn split_lines(&mut self, text: &str) -> Vec<String> {
        self.carry.push_str(text);
        if !self.carry.contains('\n') {
            return Vec::new();
        }

        let mut segments: Vec<&str> = self.carry.split('\n').collect();
        let tail = segments.pop().unwrap_or_default().to_string();
        let lines = segments
            .into_iter()
            .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
            .collect();
        self.carry = tail;
        lines
    }
}
