//! Subprocess spawning and output streaming

pub mod builder;
pub mod error;
pub mod runner;
pub mod streaming;


pub use builder::ProcessCommandBuilder;
pub use error::ProcessError;
pub use runner::{ExitStatus, ProcessCommand, RunningProcess};
