//! Durable raw log of escape-stripped subprocess output

use crate::error::{ErrorExt, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Append-only log shared by the stdout and stderr drains.
///
/// Writes happen one chunk at a time under an async mutex, so output from the
/// two streams interleaves at chunk granularity and is never torn mid-chunk.
#[derive(Clone)]
pub struct RawLog {
    path: PathBuf,
    file: Arc<Mutex<File>>,
}

impl RawLog {
    pub async fn open(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .to_storage_error(parent, "create log directory")?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .to_storage_error(&path, "open raw log")?;

        Ok(Self {
            path,
            file: Arc::new(Mutex::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append text; failures are logged and otherwise ignored so that a full
    /// disk never stalls parsing.
    pub async fn append(&self, text: &str) {
        if text.is_empty() {
            return;
        }
        let mut file = self.file.lock().await;
        if let Err(e) = file.write_all(text.as_bytes()).await {
            tracing::warn!("Failed to append to raw log {}: {}", self.path.display(), e);
        }
    }

    pub async fn flush(&self) {
        let mut file = self.file.lock().await;
        if let Err(e) = file.flush().await {
            tracing::warn!("Failed to flush raw log {}: {}", self.path.display(), e);
        }
    }
}
