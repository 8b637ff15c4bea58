use std::fmt::Display;
use std::path::PathBuf;
use thiserror::Error;

pub mod codes;
pub mod helpers;

#[cfg(test)]
mod tests;

pub use codes::{describe_error_code, ErrorCode};
pub use helpers::ErrorExt;

type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// Infrastructure errors raised by the supervisor.
///
/// Per-unit failures, ignores and unmatched lines never surface here: they are
/// counted in the progress state. Only problems that prevent a run from being
/// supervised or recorded become a `CrawlwatchError`.
#[derive(Error, Debug)]
pub enum CrawlwatchError {
    /// Bad or unreadable configuration, including vocabulary patterns
    #[error("[E{code:04}] Configuration error: {message}")]
    Config {
        code: u16,
        message: String,
        field: Option<String>,
        #[source]
        source: Option<BoxedSource>,
    },

    /// Files under the output directory: logs, live status, journal, run record
    #[error("[E{code:04}] Storage error: {message}")]
    Storage {
        code: u16,
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<BoxedSource>,
    },

    /// The crawler process could not be started or observed
    #[error("[E{code:04}] Execution error: {message}")]
    Execution {
        code: u16,
        message: String,
        command: Option<String>,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("[E{code:04}] {message}")]
    Other {
        code: u16,
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },
}

impl CrawlwatchError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::config_with_code(ErrorCode::CONFIG_GENERIC, message, None)
    }

    /// Configuration error pointing at a dotted field such as `crawl.end_id`
    pub fn config_with_code(code: u16, message: impl Into<String>, field: Option<String>) -> Self {
        Self::Config {
            code,
            message: message.into(),
            field,
            source: None,
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::storage_with_code(ErrorCode::STORAGE_GENERIC, message, None)
    }

    pub fn storage_with_code(code: u16, message: impl Into<String>, path: Option<PathBuf>) -> Self {
        Self::Storage {
            code,
            message: message.into(),
            path,
            source: None,
        }
    }

    pub fn execution(message: impl Into<String>) -> Self {
        Self::execution_with_code(ErrorCode::EXEC_GENERIC, message, None)
    }

    pub fn execution_with_code(
        code: u16,
        message: impl Into<String>,
        command: Option<String>,
    ) -> Self {
        Self::Execution {
            code,
            message: message.into(),
            command,
            source: None,
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            code: ErrorCode::OTHER_GENERIC,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<BoxedSource>) -> Self {
        *self.source_slot() = Some(source.into());
        self
    }

    /// Append context to the message, `message: context`
    pub fn with_context(mut self, context: impl Display) -> Self {
        let message = self.message_mut();
        *message = format!("{}: {}", message, context);
        self
    }

    fn source_slot(&mut self) -> &mut Option<BoxedSource> {
        match self {
            Self::Config { source, .. }
            | Self::Storage { source, .. }
            | Self::Execution { source, .. }
            | Self::Other { source, .. } => source,
        }
    }

    fn message_mut(&mut self) -> &mut String {
        match self {
            Self::Config { message, .. }
            | Self::Storage { message, .. }
            | Self::Execution { message, .. }
            | Self::Other { message, .. } => message,
        }
    }

    /// Process exit code the CLI uses when this error ends a command
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config { .. } => 2,
            Self::Storage { .. } => 4,
            Self::Execution { .. } => 5,
            Self::Other { .. } => 1,
        }
    }

    pub fn code(&self) -> u16 {
        match self {
            Self::Config { code, .. }
            | Self::Storage { code, .. }
            | Self::Execution { code, .. }
            | Self::Other { code, .. } => *code,
        }
    }

    /// True when a persisted file (run record, live status, journal) is absent
    pub fn is_not_found(&self) -> bool {
        matches!(
            self.code(),
            ErrorCode::STORAGE_NOT_FOUND | ErrorCode::CONFIG_NOT_FOUND
        )
    }

    /// Message for the run record and the terminal, naming the field, path or command
    pub fn user_message(&self) -> String {
        match self {
            Self::Config {
                message,
                field: Some(field),
                ..
            } => format!("Configuration problem in '{}': {}", field, message),
            Self::Config { message, .. } => format!("Configuration problem: {}", message),
            Self::Storage {
                message,
                path: Some(path),
                ..
            } => format!("Storage error at {}: {}", path.display(), message),
            Self::Storage { message, .. } => format!("Storage error: {}", message),
            Self::Execution {
                message,
                command: Some(command),
                ..
            } => format!("Command '{}' failed: {}", command, message),
            Self::Execution { message, .. } => format!("Execution error: {}", message),
            Self::Other { message, .. } => message.clone(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CrawlwatchError>;
