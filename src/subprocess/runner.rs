use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::{Child, ChildStderr, ChildStdout};

use super::error::ProcessError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessCommand {
    pub program: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    pub working_dir: Option<PathBuf>,
}

impl fmt::Display for ProcessCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.args.is_empty() {
            write!(f, "{}", self.program)
        } else {
            write!(f, "{} {}", self.program, self.args.join(" "))
        }
    }
}

/// How the child process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ExitStatus {
    Success,
    Error(i32),
    Signal(i32),
}

impl ExitStatus {
    pub fn success(&self) -> bool {
        matches!(self, ExitStatus::Success)
    }

    pub fn code(&self) -> Option<i32> {
        match self {
            ExitStatus::Success => Some(0),
            ExitStatus::Error(code) => Some(*code),
            ExitStatus::Signal(_) => None,
        }
    }
}

impl From<std::process::ExitStatus> for ExitStatus {
    fn from(status: std::process::ExitStatus) -> Self {
        if status.success() {
            ExitStatus::Success
        } else if let Some(code) = status.code() {
            ExitStatus::Error(code)
        } else {
            parse_signal_status(status)
        }
    }
}

#[cfg(unix)]
fn parse_signal_status(status: std::process::ExitStatus) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;
    match status.signal() {
        Some(signal) => ExitStatus::Signal(signal),
        None => ExitStatus::Error(1),
    }
}

#[cfg(not(unix))]
fn parse_signal_status(_status: std::process::ExitStatus) -> ExitStatus {
    ExitStatus::Error(1)
}

/// A spawned child whose output pipes have been taken for draining
pub struct RunningProcess {
    child: Child,
    pid: Option<u32>,
    command: String,
}

impl RunningProcess {
    /// Spawn `command` with stdin closed and both output streams piped.
    ///
    /// On unix the child leads its own process group so that a kill reaches
    /// anything it forked, which would otherwise keep the pipes open.
    pub fn spawn(
        command: &ProcessCommand,
    ) -> Result<(Self, ChildStdout, ChildStderr), ProcessError> {
        log_command_start(command);

        let mut cmd = tokio::process::Command::new(&command.program);
        cmd.args(&command.args);

        #[cfg(unix)]
        {
            cmd.process_group(0);
        }

        for (key, value) in &command.env {
            cmd.env(key, value);
        }
        if let Some(dir) = &command.working_dir {
            cmd.current_dir(dir);
        }

        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| map_spawn_error(e, &command.program, command))?;

        let stdout = child.stdout.take().ok_or(ProcessError::MissingPipe("stdout"))?;
        let stderr = child.stderr.take().ok_or(ProcessError::MissingPipe("stderr"))?;
        let pid = child.id();

        tracing::debug!("Spawned subprocess (pid {:?}): {}", pid, command);

        Ok((
            Self {
                child,
                pid,
                command: command.to_string(),
            },
            stdout,
            stderr,
        ))
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub async fn wait(&mut self) -> Result<ExitStatus, ProcessError> {
        let status = self.child.wait().await?;
        let status = ExitStatus::from(status);
        match status {
            ExitStatus::Success => tracing::debug!("Subprocess completed: {}", self.command),
            ExitStatus::Error(code) => {
                tracing::debug!("Subprocess failed with exit code {}: {}", code, self.command)
            }
            ExitStatus::Signal(signal) => {
                tracing::warn!("Subprocess terminated by signal {}: {}", signal, self.command)
            }
        }
        Ok(status)
    }

    /// Send a kill to the child's process group without waiting for it.
    pub fn start_kill(&mut self) {
        #[cfg(unix)]
        {
            use nix::sys::signal::{killpg, Signal};
            use nix::unistd::Pid;

            if let Some(raw) = self.pid.and_then(|pid| i32::try_from(pid).ok()) {
                match killpg(Pid::from_raw(raw), Signal::SIGKILL) {
                    Ok(()) => return,
                    Err(e) => tracing::debug!("killpg({}) failed, falling back: {}", raw, e),
                }
            }
        }

        if let Err(e) = self.child.start_kill() {
            tracing::warn!("Failed to kill subprocess {}: {}", self.command, e);
        }
    }
}

fn log_command_start(command: &ProcessCommand) {
    tracing::debug!("Executing subprocess: {}", command);

    if !command.env.is_empty() {
        tracing::debug!("Environment variables count: {}", command.env.len());
        tracing::trace!("Environment variables: {:?}", command.env);
    }

    if let Some(ref dir) = command.working_dir {
        tracing::trace!("Working directory: {:?}", dir);
    }
}

fn map_spawn_error(error: std::io::Error, program: &str, command: &ProcessCommand) -> ProcessError {
    if error.kind() == std::io::ErrorKind::NotFound {
        ProcessError::CommandNotFound(program.to_string())
    } else {
        ProcessError::SpawnFailed {
            command: command.to_string(),
            source: error,
        }
    }
}
