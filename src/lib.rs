//! # crawlwatch
//!
//! Supervises a crawler subprocess that reports progress as free-form text
//! and turns that text into structured, observable progress state.
//!
//! ## Usage
//!
//! ```bash
//! crawlwatch run [-c crawlwatch.toml] [--start-id N --end-id M] [-- program args...]
//! crawlwatch status | replay | last
//! ```
//!
//! ## Modules
//!
//! - `subprocess` - Spawning the crawler and draining its output as lines
//! - `classify` - Rule-based recognition of progress lines
//! - `progress` - Pending-unit resolution, counters and snapshots
//! - `live` - Live status file, event journal and journal replay
//! - `artifact` - Locating and archiving exported files
//! - `fatal` - Detection of systemic crawler failures
//! - `supervisor` - One supervised run, start to persisted result
//! - `config` - TOML configuration with environment overrides
//! - `layout` - The persisted output directory structure
pub mod artifact;
pub mod classify;
pub mod config;
pub mod error;
pub mod fatal;
pub mod layout;
pub mod live;
pub mod progress;
pub mod subprocess;
pub mod supervisor;

#[cfg(test)]
mod property_tests;

pub use error::{CrawlwatchError, Result};
pub use supervisor::{CancelHandle, RunResult, Supervisor};
