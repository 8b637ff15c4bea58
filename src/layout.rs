//! Persisted directory structure of one installation

use crate::error::{CrawlwatchError, ErrorCode, ErrorExt, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

pub const LAST_RUN_FILE: &str = "last_run.json";
pub const LIVE_STATUS_FILE: &str = "live_status.json";
pub const LIVE_EVENTS_FILE: &str = "live_events.jsonl";
pub const LOGS_DIR: &str = "logs";
pub const EXPORTS_DIR: &str = "exports";

/// Paths under the output root:
///
/// ```text
/// <root>/last_run.json
/// <root>/live_status.json
/// <root>/live_events.jsonl
/// <root>/logs/run_<millis>.log
/// <root>/exports/<millis>_<basename>
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn last_run_path(&self) -> PathBuf {
        self.root.join(LAST_RUN_FILE)
    }

    pub fn live_status_path(&self) -> PathBuf {
        self.root.join(LIVE_STATUS_FILE)
    }

    pub fn live_events_path(&self) -> PathBuf {
        self.root.join(LIVE_EVENTS_FILE)
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join(LOGS_DIR)
    }

    pub fn exports_dir(&self) -> PathBuf {
        self.root.join(EXPORTS_DIR)
    }

    pub fn run_log_path(&self, started_millis: i64) -> PathBuf {
        self.logs_dir().join(format!("run_{}.log", started_millis))
    }

    /// Create the root, logs and exports directories
    pub async fn ensure(&self) -> Result<()> {
        for dir in [self.root.clone(), self.logs_dir(), self.exports_dir()] {
            fs::create_dir_all(&dir)
                .await
                .to_storage_error(&dir, "create output directory")?;
        }
        Ok(())
    }
}

/// Serialize `value` as pretty JSON and replace `path` atomically
pub async fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).map_err(|e| {
        CrawlwatchError::storage_with_code(
            ErrorCode::STORAGE_SERIALIZATION_ERROR,
            "failed to serialize JSON document",
            Some(path.to_path_buf()),
        )
        .with_source(e)
    })?;

    let temp = path.with_extension("json.tmp");
    fs::write(&temp, json)
        .await
        .to_storage_error(&temp, "write temporary file")?;
    fs::rename(&temp, path)
        .await
        .to_storage_error(path, "rename temporary file")?;
    Ok(())
}

/// Read and deserialize a JSON document
pub async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(CrawlwatchError::storage_with_code(
                ErrorCode::STORAGE_NOT_FOUND,
                format!("{} does not exist", path.display()),
                Some(path.to_path_buf()),
            ))
        }
        Err(e) => return Err(e).to_storage_error(path, "read file"),
    };

    serde_json::from_str(&content).map_err(|e| {
        CrawlwatchError::storage_with_code(
            ErrorCode::STORAGE_DESERIALIZATION_ERROR,
            format!("{} is not valid JSON for this record", path.display()),
            Some(path.to_path_buf()),
        )
        .with_source(e)
    })
}
