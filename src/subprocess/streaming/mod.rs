//! Real-time streaming infrastructure for subprocess output
//!
//! Output is read chunk by chunk as it arrives, reassembled into lines,
//! copied to a raw log and handed to a [`LineConsumer`]. stdout and stderr are
//! drained by separate tasks so neither can back up the other.

pub mod line_buffer;
pub mod processor;
pub mod raw_log;
pub mod runner;
pub mod types;


pub use line_buffer::{strip_ansi, LineReassembler};
#[cfg(test)]
pub use processor::CollectingConsumer;
pub use processor::LineConsumer;
pub use raw_log::RawLog;
pub use runner::{drain_stream, READ_CHUNK_SIZE};
pub use types::{DrainStats, ReassembledChunk, StreamSource};
