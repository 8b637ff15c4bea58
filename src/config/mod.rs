//! Supervisor configuration
//!
//! Loaded from TOML (see [`ConfigLoader`]) with environment overrides applied
//! on top. Every section has defaults, so an empty file is a valid config.

use crate::classify::Vocabulary;
use crate::error::{CrawlwatchError, ErrorCode, Result};
use crate::fatal::{default_signatures, TerminalFailureDetector};
use crate::subprocess::{ProcessCommand, ProcessCommandBuilder};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

pub mod loader;


pub use loader::ConfigLoader;

pub const DEFAULT_OUTPUT_DIR: &str = "crawl-output";
pub const CONFIG_FILE_NAME: &str = "crawlwatch.toml";

pub const ENV_OUTPUT_DIR: &str = "CRAWLWATCH_OUTPUT_DIR";
pub const ENV_LOG_LEVEL: &str = "CRAWLWATCH_LOG_LEVEL";

/// Platform config directory, e.g. `~/.config/crawlwatch` on Linux
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("com", "crawlwatch", "crawlwatch").map(|dirs| dirs.config_dir().to_path_buf())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    pub output_dir: PathBuf,
    pub log_level: Option<String>,
    pub command: CommandConfig,
    pub crawl: CrawlParams,
    pub fatal: FatalConfig,
    pub vocabulary: Vocabulary,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            log_level: None,
            command: CommandConfig::default(),
            crawl: CrawlParams::default(),
            fatal: FatalConfig::default(),
            vocabulary: Vocabulary::default(),
        }
    }
}

/// The crawler invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandConfig {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    pub env: HashMap<String, String>,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            program: "node".to_string(),
            args: vec!["dist/src/tauri/爬虫.tauri.js".to_string()],
            working_dir: None,
            env: HashMap::new(),
        }
    }
}

/// What the controller asks the crawler to do
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlParams {
    pub start_id: Option<u64>,
    pub end_id: Option<u64>,
    pub group_size: Option<u32>,
    /// Where the crawler itself should write its export
    pub output_location: Option<PathBuf>,
}

impl CrawlParams {
    /// Environment variables handed to the crawler
    pub fn to_env(&self) -> Vec<(String, String)> {
        let mut vars = Vec::new();
        if let Some(start) = self.start_id {
            vars.push(("CRAWL_START_ID".to_string(), start.to_string()));
        }
        if let Some(end) = self.end_id {
            vars.push(("CRAWL_END_ID".to_string(), end.to_string()));
        }
        if let Some(size) = self.group_size {
            vars.push(("CRAWL_GROUP_SIZE".to_string(), size.to_string()));
        }
        if let Some(dir) = &self.output_location {
            vars.push(("CRAWL_OUTPUT_DIR".to_string(), dir.display().to_string()));
        }
        vars
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FatalConfig {
    pub signatures: Vec<String>,
    /// Also look for signatures on stdout
    pub scan_stdout: bool,
    /// Kill the crawler once a signature is seen
    pub terminate: bool,
}

impl Default for FatalConfig {
    fn default() -> Self {
        Self {
            signatures: default_signatures(),
            scan_stdout: false,
            terminate: true,
        }
    }
}

impl SupervisorConfig {
    /// Apply `CRAWLWATCH_*` variables from the process environment
    pub fn merge_env_vars(&mut self) {
        self.apply_env(|key| std::env::var(key).ok());
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = lookup(ENV_OUTPUT_DIR).filter(|v| !v.trim().is_empty()) {
            self.output_dir = PathBuf::from(dir);
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL).filter(|v| !v.trim().is_empty()) {
            self.log_level = Some(level);
        }
    }

    /// Tracing filter for this run: `-v` flags win, then `log_level`, then `info`
    pub fn log_filter(&self, verbose: u8) -> String {
        match verbose {
            0 => self
                .log_level
                .clone()
                .unwrap_or_else(|| "info".to_string()),
            1 => "debug".to_string(),
            2 => "trace".to_string(),
            _ => "trace,tokio=debug".to_string(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.command.program.trim().is_empty() {
            return Err(CrawlwatchError::config_with_code(
                ErrorCode::CONFIG_VALIDATION_FAILED,
                "crawler program must not be empty",
                Some("command.program".to_string()),
            ));
        }

        if let (Some(start), Some(end)) = (self.crawl.start_id, self.crawl.end_id) {
            if start > end {
                return Err(CrawlwatchError::config_with_code(
                    ErrorCode::CONFIG_VALIDATION_FAILED,
                    format!("start_id {} is greater than end_id {}", start, end),
                    Some("crawl.start_id".to_string()),
                ));
            }
        }

        if self.crawl.group_size == Some(0) {
            return Err(CrawlwatchError::config_with_code(
                ErrorCode::CONFIG_VALIDATION_FAILED,
                "group_size must be at least 1",
                Some("crawl.group_size".to_string()),
            ));
        }

        self.vocabulary.compile()?;
        TerminalFailureDetector::from_signatures(&self.fatal.signatures)?;
        Ok(())
    }

    /// The crawler command with crawl parameters in its environment
    pub fn process_command(&self) -> ProcessCommand {
        ProcessCommandBuilder::new(self.command.program.as_str())
            .args(&self.command.args)
            .envs(self.command.env.clone())
            .envs(self.crawl.to_env())
            .working_dir(self.command.working_dir.as_deref())
            .build()
    }
}
