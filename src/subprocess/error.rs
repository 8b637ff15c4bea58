use crate::error::{CrawlwatchError, ErrorCode};

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("Command not found: {0}")]
    CommandNotFound(String),

    #[error("Failed to spawn '{command}': {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Child process has no {0} pipe")]
    MissingPipe(&'static str),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ProcessError> for CrawlwatchError {
    fn from(err: ProcessError) -> Self {
        let (code, command) = match &err {
            ProcessError::CommandNotFound(cmd) => {
                (ErrorCode::EXEC_COMMAND_NOT_FOUND, Some(cmd.clone()))
            }
            ProcessError::SpawnFailed { command, .. } => {
                (ErrorCode::EXEC_SPAWN_FAILED, Some(command.clone()))
            }
            ProcessError::MissingPipe(_) | ProcessError::Io(_) => {
                (ErrorCode::EXEC_OUTPUT_ERROR, None)
            }
        };

        CrawlwatchError::execution_with_code(code, err.to_string(), command).with_source(err)
    }
}
