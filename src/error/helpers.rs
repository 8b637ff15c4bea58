use super::{CrawlwatchError, ErrorCode};
use std::path::Path;

/// Extension trait for convenient error conversion
pub trait ErrorExt<T> {
    fn to_config_error(self, message: impl Into<String>) -> Result<T, CrawlwatchError>;
    fn to_execution_error(self, message: impl Into<String>) -> Result<T, CrawlwatchError>;

    /// Convert to a storage I/O error tagged with the path being touched
    fn to_storage_error(self, path: &Path, operation: &str) -> Result<T, CrawlwatchError>;
}

impl<T, E> ErrorExt<T> for Result<T, E>
where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    fn to_config_error(self, message: impl Into<String>) -> Result<T, CrawlwatchError> {
        self.map_err(|e| CrawlwatchError::config(message).with_source(e))
    }

    fn to_execution_error(self, message: impl Into<String>) -> Result<T, CrawlwatchError> {
        self.map_err(|e| CrawlwatchError::execution(message).with_source(e))
    }

    fn to_storage_error(self, path: &Path, operation: &str) -> Result<T, CrawlwatchError> {
        self.map_err(|e| {
            CrawlwatchError::storage_with_code(
                ErrorCode::STORAGE_IO_ERROR,
                format!("Storage {} failed", operation),
                Some(path.to_path_buf()),
            )
            .with_source(e)
        })
    }
}
