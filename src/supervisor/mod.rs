//! Supervision of one crawler run
//!
//! The supervisor spawns the crawler, drains stdout through the progress
//! pipeline and stderr through the [`StderrMonitor`], and waits for the first
//! of exit, cancellation or a fatal signal. Cancel and fatal stay live until
//! both streams close, even after the crawler itself has exited. Once the
//! streams are drained it flushes the pipeline, archives artifacts and
//! persists the [`RunResult`].

pub mod monitor;
pub mod run_result;


pub use monitor::StderrMonitor;
pub use run_result::{overall_verdict, run_status, RunResult, RunStatus, Termination};

use crate::artifact::{ArtifactArchiver, ArtifactLocator};
use crate::classify::Classifier;
use crate::config::SupervisorConfig;
use crate::error::{CrawlwatchError, ErrorCode, Result};
use crate::fatal::{FatalSignal, TerminalFailureDetector};
use crate::layout::OutputLayout;
use crate::live::{FileLiveReporter, LiveSink};
use crate::progress::ProgressPipeline;
use crate::subprocess::streaming::{drain_stream, RawLog, StreamSource};
use crate::subprocess::{ExitStatus, RunningProcess};
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    NotStarted,
    Running,
    Succeeded,
    Failed,
}

/// Requests cancellation of a run; cheap to clone and send across tasks.
#[derive(Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

pub struct Supervisor {
    config: SupervisorConfig,
    layout: OutputLayout,
    state: SupervisorState,
    cancel: CancelHandle,
    sink: Option<Arc<dyn LiveSink>>,
}

impl Supervisor {
    pub fn new(config: SupervisorConfig) -> Self {
        let layout = OutputLayout::new(config.output_dir.clone());
        Self {
            config,
            layout,
            state: SupervisorState::NotStarted,
            cancel: CancelHandle::new(),
            sink: None,
        }
    }

    /// Publish live progress somewhere other than the output directory
    pub fn with_sink(mut self, sink: Arc<dyn LiveSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    /// Run the crawler once.
    ///
    /// Crawl problems (failed units, fatal signatures, non-zero exit, spawn
    /// failure) are reported in the returned [`RunResult`]. An `Err` means the
    /// run could not be supervised or recorded at all.
    pub async fn run(&mut self) -> Result<RunResult> {
        if self.state != SupervisorState::NotStarted {
            return Err(CrawlwatchError::execution_with_code(
                ErrorCode::EXEC_ALREADY_STARTED,
                "supervisor has already run",
                None,
            ));
        }
        self.state = SupervisorState::Running;

        match self.supervise().await {
            Ok(result) => {
                self.state = if result.is_success() {
                    SupervisorState::Succeeded
                } else {
                    SupervisorState::Failed
                };
                Ok(result)
            }
            Err(e) => {
                error!("Run could not be supervised: {}", e);
                self.state = SupervisorState::Failed;
                Err(e)
            }
        }
    }

    async fn supervise(&self) -> Result<RunResult> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();

        self.layout.ensure().await?;
        let log_path = self.layout.run_log_path(started_at.timestamp_millis());
        let raw_log = RawLog::open(log_path.clone()).await?;

        let vocabulary = self.config.vocabulary.compile()?;
        let error_pattern = vocabulary.error_message.clone();
        let classifier = Arc::new(Classifier::from_compiled(vocabulary));
        debug!("Classifier rules: {}", classifier.rule_names().join(", "));
        let detector = TerminalFailureDetector::from_signatures(&self.config.fatal.signatures)?;

        let sink: Arc<dyn LiveSink> = match &self.sink {
            Some(sink) => sink.clone(),
            None => Arc::new(FileLiveReporter::for_layout(&self.layout).await?),
        };

        let mut pipeline = ProgressPipeline::new(classifier, sink)
            .with_artifacts(ArtifactLocator::new(self.artifact_base_dir()));
        if self.config.fatal.scan_stdout {
            pipeline = pipeline.with_fatal_detector(detector.clone());
        }
        pipeline.begin(run_id).await;

        let command = self.config.process_command();
        info!("Starting run {} with {}", run_id, command);

        let (mut process, stdout, stderr) = match RunningProcess::spawn(&command) {
            Ok(spawned) => spawned,
            Err(e) => {
                let err = CrawlwatchError::from(e);
                warn!("Crawler did not start: {}", err);
                raw_log.flush().await;
                let summary = pipeline.finish().await;
                let result = RunResult {
                    run_id,
                    status: RunStatus::Error,
                    termination: None,
                    exit_status: None,
                    exit_code: None,
                    started_at,
                    ended_at: Utc::now(),
                    log_path,
                    artifact_path: None,
                    archived_path: None,
                    artifacts: Vec::new(),
                    counters: summary.counters,
                    overall: None,
                    error_message: Some(err.user_message()),
                    fatal_signal: None,
                };
                result.persist(&self.layout).await?;
                return Ok(result);
            }
        };

        let stdout_task = tokio::spawn(drain_stream(
            stdout,
            StreamSource::Stdout,
            Some(raw_log.clone()),
            pipeline,
        ));
        let stderr_task = tokio::spawn(drain_stream(
            stderr,
            StreamSource::Stderr,
            Some(raw_log.clone()),
            StderrMonitor::new(detector.clone(), error_pattern),
        ));

        let mut stops = StopWatch::new(self.cancel.subscribe(), detector.subscribe());
        let mut termination = Termination::Exited;

        let wait_result = loop {
            tokio::select! {
                status = process.wait() => break status,
                stop = stops.next() => {
                    termination = self.stop_crawler(stop, &mut process, &mut stops, termination);
                }
            }
        };

        // Anything the crawler forked may still hold the pipes open.
        let drains = async { tokio::join!(stdout_task, stderr_task) };
        tokio::pin!(drains);
        let (stdout_joined, stderr_joined) = loop {
            tokio::select! {
                joined = &mut drains => break joined,
                stop = stops.next() => {
                    info!("Crawler exited but its output is still open");
                    termination = self.stop_crawler(stop, &mut process, &mut stops, termination);
                }
            }
        };
        let (mut pipeline, stdout_stats) = stdout_joined.map_err(join_error)?;
        let (monitor, stderr_stats) = stderr_joined.map_err(join_error)?;
        raw_log.flush().await;
        info!(
            "Streams closed: stdout {} lines, stderr {} lines",
            stdout_stats.lines, stderr_stats.lines
        );

        let summary = pipeline.finish().await;

        let archiver = ArtifactArchiver::new(self.layout.exports_dir());
        let artifacts = archiver.archive_all(summary.artifacts.announced()).await;
        let artifact_path = summary.artifacts.latest().map(|p| p.to_path_buf());
        let archived_path = artifacts
            .iter()
            .rev()
            .find(|record| Some(&record.source) == artifact_path.as_ref())
            .and_then(|record| record.archived.clone());

        let fatal_signal = detector.signal();
        let termination = match (termination, &fatal_signal) {
            (Termination::Exited, Some(_)) => Termination::Fatal,
            (other, _) => other,
        };
        let (exit_status, wait_error) = match wait_result {
            Ok(status) => (Some(status), None),
            Err(e) => (None, Some(e.to_string())),
        };
        let exit_code = exit_status.and_then(|s| s.code());
        let status = run_status(Some(termination), exit_code, fatal_signal.as_ref());

        let error_message = monitor.into_first_error().or(wait_error).or_else(|| {
            (status == RunStatus::Error)
                .then(|| describe_failure(termination, exit_status, fatal_signal.as_ref()))
        });

        let result = RunResult {
            run_id,
            status,
            termination: Some(termination),
            exit_status,
            exit_code,
            started_at,
            ended_at: Utc::now(),
            log_path,
            artifact_path,
            archived_path,
            artifacts,
            overall: overall_verdict(&summary.counters),
            counters: summary.counters,
            error_message,
            fatal_signal,
        };

        info!(
            "Run {} finished: {:?}, {:?}, {} processed ({} ok, {} failed, {} ignored)",
            run_id,
            result.status,
            termination,
            result.counters.processed,
            result.counters.success,
            result.counters.failed,
            result.counters.ignored
        );

        result.persist(&self.layout).await?;
        Ok(result)
    }

    /// Act on a cancel or fatal signal and return the new termination cause.
    fn stop_crawler(
        &self,
        stop: Stop,
        process: &mut RunningProcess,
        stops: &mut StopWatch,
        current: Termination,
    ) -> Termination {
        match stop {
            Stop::Cancel => {
                info!("Run cancelled, stopping crawler");
                process.start_kill();
                stops.disarm();
                Termination::Cancelled
            }
            Stop::Fatal if self.config.fatal.terminate => {
                error!("Stopping crawler after fatal failure");
                process.start_kill();
                stops.disarm();
                Termination::Fatal
            }
            Stop::Fatal => {
                warn!("Fatal failure reported, crawler left running");
                match current {
                    Termination::Exited => Termination::Fatal,
                    other => other,
                }
            }
        }
    }

    fn artifact_base_dir(&self) -> Option<PathBuf> {
        self.config
            .command
            .working_dir
            .clone()
            .or_else(|| std::env::current_dir().ok())
    }
}

enum Stop {
    Cancel,
    Fatal,
}

/// Cancel and fatal notifications that can still stop the crawler.
///
/// Each fires at most once; a kill disarms both.
struct StopWatch {
    cancel_rx: watch::Receiver<bool>,
    fatal_rx: watch::Receiver<Option<FatalSignal>>,
    cancel_armed: bool,
    fatal_armed: bool,
}

impl StopWatch {
    fn new(
        cancel_rx: watch::Receiver<bool>,
        fatal_rx: watch::Receiver<Option<FatalSignal>>,
    ) -> Self {
        Self {
            cancel_rx,
            fatal_rx,
            cancel_armed: true,
            fatal_armed: true,
        }
    }

    fn disarm(&mut self) {
        self.cancel_armed = false;
        self.fatal_armed = false;
    }

    /// Resolve on the next armed notification; pends forever once none are left.
    async fn next(&mut self) -> Stop {
        let Self {
            cancel_rx,
            fatal_rx,
            cancel_armed,
            fatal_armed,
        } = self;

        loop {
            tokio::select! {
                ok = async { cancel_rx.wait_for(|c| *c).await.is_ok() }, if *cancel_armed => {
                    *cancel_armed = false;
                    if ok {
                        return Stop::Cancel;
                    }
                }
                ok = async { fatal_rx.wait_for(|s| s.is_some()).await.is_ok() }, if *fatal_armed => {
                    *fatal_armed = false;
                    if ok {
                        return Stop::Fatal;
                    }
                }
                else => std::future::pending::<()>().await,
            }
        }
    }
}

fn describe_failure(
    termination: Termination,
    exit_status: Option<ExitStatus>,
    fatal: Option<&FatalSignal>,
) -> String {
    match (termination, fatal) {
        (Termination::Cancelled, _) => "run cancelled".to_string(),
        (_, Some(signal)) => format!("fatal crawler failure: {}", signal.line),
        _ => match exit_status {
            Some(ExitStatus::Error(code)) => format!("crawler exited with code {}", code),
            Some(ExitStatus::Signal(sig)) => format!("crawler killed by signal {}", sig),
            Some(ExitStatus::Success) | None => "crawler did not finish cleanly".to_string(),
        },
    }
}

fn join_error(e: tokio::task::JoinError) -> CrawlwatchError {
    CrawlwatchError::other(format!("stream drain task failed: {}", e))
        .with_source(e)
}
