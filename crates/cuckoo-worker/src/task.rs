//! Submission, polling and collection of one analysis.
//!
//! A [`Worker`] holds what every analysis shares: the sandbox connection, the
//! rating table and the [`WorkerConfig`]. Each work item is driven by a
//! [`CuckooTask`] through the states of [`TaskState`]:
//!
//! ```text
//! Init -> Submitting -> Submitted -> Polling -> Complete -> Collecting -> Cleanup -> Done
//!             |  ^
//!             +--+ retry
//!             +--> Failed
//! ```
//!
//! Sandbox failures either abort the task (`fail_on_error`) or are recorded as
//! the `cuckoo_error` attribute, after which the current step is abandoned.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use cuckoo_core::{
    AnalysisInput, AnalysisRequest, ArtifactStream, CuckooError, RatingTable, ReportFormat,
    Result as SandboxResult, TaskId, TaskInfo,
};
use tempfile::TempDir;
use tracing::{debug, error, info, warn};

use crate::artifact::{file_stream, md5_hex, spool, SpoolError};
use crate::config::WorkerConfig;
use crate::context::{keys, JobContext};
use crate::error::{StorageError, TaskError};
use crate::report::score_stream;
use crate::sandbox::Sandbox;
use crate::url::prepare_url;
use crate::wait::Wait;

/// Local fallback format of `cuckoo_time_stop`
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Where an analysis is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Input not yet prepared
    Init,
    /// Sending the input to the sandbox
    Submitting,
    /// The sandbox accepted the input
    Submitted,
    /// Waiting for the report
    Polling,
    /// The report is ready
    Complete,
    /// Scoring and saving artifacts
    Collecting,
    /// Removing sandbox-side data
    Cleanup,
    /// Finished
    Done,
    /// Submission given up
    Failed,
}

impl TaskState {
    /// Lowercase name for logs
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Submitting => "submitting",
            Self::Submitted => "submitted",
            Self::Polling => "polling",
            Self::Complete => "complete",
            Self::Collecting => "collecting",
            Self::Cleanup => "cleanup",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a non-fatal analysis ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Every step ran; some artifacts may have been recorded as errors
    Completed,
    /// Submission failed and the error was recorded
    Abandoned,
    /// A wait was cancelled; nothing further was recorded
    Cancelled {
        /// State the task was waiting in
        during: TaskState,
    },
}

/// Shared resources for running analyses
#[derive(Debug)]
pub struct Worker<S> {
    sandbox: S,
    ratings: Arc<RatingTable>,
    config: WorkerConfig,
}

impl<S: Sandbox> Worker<S> {
    /// Create a worker
    pub const fn new(sandbox: S, ratings: Arc<RatingTable>, config: WorkerConfig) -> Self {
        Self {
            sandbox,
            ratings,
            config,
        }
    }

    /// The sandbox connection
    pub const fn sandbox(&self) -> &S {
        &self.sandbox
    }

    /// The worker configuration
    pub const fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Run one analysis to the end.
    ///
    /// `wait` is used for every sleep of the analysis; cancelling it stops the
    /// task silently with [`TaskOutcome::Cancelled`].
    pub async fn process<C: JobContext>(
        &self,
        request: AnalysisRequest,
        ctx: &mut C,
        wait: Wait,
    ) -> Result<TaskOutcome, TaskError> {
        CuckooTask::new(self, request, ctx, wait).run().await
    }
}

/// Result of a step: carry on with a value or stop with an outcome
enum Flow<T> {
    Next(T),
    Stop(TaskOutcome),
}

/// What gets submitted once the request is resolved
enum Submission {
    /// Input written to a directory private to this analysis, removed on drop
    File { path: PathBuf, _dir: TempDir },
    Url(String),
}

/// One analysis in progress
pub struct CuckooTask<'a, S, C> {
    worker: &'a Worker<S>,
    request: AnalysisRequest,
    ctx: &'a mut C,
    wait: Wait,
    state: TaskState,
}

impl<'a, S: Sandbox, C: JobContext> CuckooTask<'a, S, C> {
    /// Prepare an analysis
    pub fn new(worker: &'a Worker<S>, request: AnalysisRequest, ctx: &'a mut C, wait: Wait) -> Self {
        Self {
            worker,
            request,
            ctx,
            wait,
            state: TaskState::Init,
        }
    }

    /// Drive the analysis through every state.
    pub async fn run(mut self) -> Result<TaskOutcome, TaskError> {
        info!(job_id = %self.ctx.job_id(), req_id = %self.ctx.req_id(), "starting analysis");

        let submission = self.resolve_input().await?;
        self.transition(TaskState::Submitting);
        let submitted = self.submit(&submission).await;
        drop(submission);
        let task_id = match submitted? {
            Flow::Next(task_id) => task_id,
            Flow::Stop(outcome) => return Ok(outcome),
        };
        self.transition(TaskState::Submitted);

        self.transition(TaskState::Polling);
        match self.poll(task_id).await? {
            Flow::Next(Some(info)) => {
                self.transition(TaskState::Complete);
                self.record_times(&info);
            }
            Flow::Next(None) => {}
            Flow::Stop(outcome) => return Ok(outcome),
        }

        self.transition(TaskState::Collecting);
        self.collect(task_id).await?;

        if self.request.clean_job_data || self.worker.config.clean_job_data {
            self.transition(TaskState::Cleanup);
            self.worker.sandbox.delete_task_data(task_id).await;
        }

        self.transition(TaskState::Done);
        Ok(TaskOutcome::Completed)
    }

    fn transition(&mut self, next: TaskState) {
        debug!(from = %self.state, to = %next, "task state");
        self.state = next;
    }

    fn cancelled(&self) -> TaskOutcome {
        info!(state = %self.state, "analysis cancelled");
        TaskOutcome::Cancelled { during: self.state }
    }

    /// Abort with the error if `fail_on_error` is set, otherwise record it.
    fn fail_or_record(&mut self, err: CuckooError) -> Result<(), TaskError> {
        if self.request.params.fail_on_error {
            return Err(TaskError::Sandbox(err));
        }
        error!(error = %err, state = %self.state, "recording error");
        self.ctx.add_attribute(keys::ERROR, &err.to_string());
        Ok(())
    }

    async fn resolve_input(&mut self) -> Result<Submission, TaskError> {
        match &self.request.input {
            AnalysisInput::Url(url) => Ok(Submission::Url(prepare_url(url))),
            AnalysisInput::Content { content, filename } => {
                let (content, filename) = (*content, filename.clone());
                let bytes = self
                    .ctx
                    .file_bytes(content)
                    .await
                    .map_err(|e| TaskError::Storage(e.to_string()))?;
                let name = filename
                    .as_deref()
                    .and_then(|name| Path::new(name).file_name())
                    .map_or_else(|| md5_hex(&bytes), |name| name.to_string_lossy().into_owned());
                let proc_path = &self.worker.config.proc_path;
                let dir = tempfile::Builder::new()
                    .prefix("cuckoo_input_")
                    .tempdir_in(proc_path)
                    .map_err(|e| TaskError::Resource(format!("{}: {e}", proc_path.display())))?;
                let path = dir.path().join(name);
                tokio::fs::write(&path, &bytes)
                    .await
                    .map_err(|e| TaskError::Resource(format!("{}: {e}", path.display())))?;
                debug!(path = %path.display(), size = bytes.len(), "materialized input file");
                Ok(Submission::File { path, _dir: dir })
            }
        }
    }

    async fn submit(&mut self, submission: &Submission) -> Result<Flow<TaskId>, TaskError> {
        let fields = self.request.params.sandbox_fields();
        let retry = self.request.params.retry;
        let mut retries_taken = 0;

        loop {
            let attempt = match submission {
                Submission::File { path, .. } => self.worker.sandbox.submit_file(path, &fields).await,
                Submission::Url(url) => self.worker.sandbox.submit_url(url, &fields).await,
            };
            let err = match attempt {
                Ok(task_id) => {
                    info!(%task_id, "submitted to sandbox");
                    return Ok(Flow::Next(task_id));
                }
                Err(e) => e,
            };

            if err.is_retryable() && retries_taken < retry {
                let minutes = self.request.params.retry_wait;
                warn!(error = %err, "submission failed, retry in {minutes} mins");
                let pause = self.worker.config.retry_wait(minutes);
                if self.wait.sleep(pause).await.is_cancelled() {
                    return Ok(Flow::Stop(self.cancelled()));
                }
                retries_taken += 1;
                continue;
            }

            if err.is_retryable() && retry > 0 {
                error!(retries = retries_taken, "giving up on submission");
            }
            self.fail_or_record(err)?;
            self.transition(TaskState::Failed);
            return Ok(Flow::Stop(TaskOutcome::Abandoned));
        }
    }

    /// Poll until the report is ready.
    ///
    /// `None` means polling failed and the error was recorded.
    async fn poll(&mut self, task_id: TaskId) -> Result<Flow<Option<TaskInfo>>, TaskError> {
        let interval = self.worker.config.poll_interval();
        loop {
            if self.wait.sleep(interval).await.is_cancelled() {
                return Ok(Flow::Stop(self.cancelled()));
            }
            match self.worker.sandbox.status(task_id).await {
                Ok(info) if info.status.is_reported() => {
                    info!(%task_id, "analysis reported");
                    return Ok(Flow::Next(Some(info)));
                }
                Ok(info) => debug!(%task_id, status = %info.status, "waiting for report"),
                Err(e) => {
                    self.fail_or_record(e)?;
                    return Ok(Flow::Next(None));
                }
            }
        }
    }

    fn record_times(&mut self, info: &TaskInfo) {
        match &info.started_on {
            Some(started) => self.ctx.add_attribute(keys::TIME_START, started),
            None => warn!("task has no start time"),
        }
        if let Some(completed) = &info.completed_on {
            self.ctx.add_attribute(keys::TIME_STOP, completed);
        } else {
            let now = chrono::Local::now().format(TIME_FORMAT).to_string();
            debug!(time = %now, "no completion time, using current time");
            self.ctx.add_attribute(keys::TIME_STOP, &now);
        }
    }

    async fn collect(&mut self, task_id: TaskId) -> Result<(), TaskError> {
        self.classify(task_id).await?;

        let params = self.request.params.clone();
        if params.save_report_html {
            let report = self.worker.sandbox.report(task_id, ReportFormat::Html).await;
            self.store(keys::REPORT_HTML, report).await?;
        }
        if params.save_report_json {
            let report = self.worker.sandbox.report(task_id, ReportFormat::Json).await;
            self.store(keys::REPORT_JSON, report).await?;
        }
        if params.save_pcap {
            self.save_pcap(task_id).await?;
        }
        if params.save_screenshots {
            let screenshots = self.worker.sandbox.screenshots(task_id).await;
            self.store(keys::SCREENSHOT, screenshots).await?;
        }
        Ok(())
    }

    async fn classify(&mut self, task_id: TaskId) -> Result<(), TaskError> {
        let scored = match self.worker.sandbox.report(task_id, ReportFormat::Json).await {
            Ok(report) => score_stream(report, Arc::clone(&self.worker.ratings)).await,
            Err(e) => Err(e),
        };
        match scored {
            Ok(summary) => {
                info!(
                    %task_id,
                    score = summary.score,
                    classification = %summary.classification,
                    "report scored"
                );
                self.ctx
                    .add_attribute(keys::CLASSIFICATION, summary.classification.as_str());
                self.ctx
                    .add_attribute(keys::CLASSIFICATION_REASON, &summary.reason);
                Ok(())
            }
            Err(e) => self.fail_or_record(e),
        }
    }

    async fn store(
        &mut self,
        key: &'static str,
        artifact: SandboxResult<ArtifactStream>,
    ) -> Result<(), TaskError> {
        let artifact = match artifact {
            Ok(artifact) => artifact,
            Err(e) => return self.fail_or_record(e),
        };
        info!(artifact = key, status = artifact.status(), "saving artifact");
        match self.ctx.save_in_data_store(artifact.into_body()).await {
            Ok(id) => {
                self.ctx.add_reference(key, id);
                Ok(())
            }
            Err(StorageError::Body(e)) => self.fail_or_record(e),
            Err(StorageError::Store(e)) => Err(TaskError::Storage(e)),
        }
    }

    async fn save_pcap(&mut self, task_id: TaskId) -> Result<(), TaskError> {
        let pcap = match self.worker.sandbox.pcap(task_id).await {
            Ok(pcap) => pcap,
            Err(e) => return self.fail_or_record(e),
        };
        info!(artifact = keys::PCAP, status = pcap.status(), "saving artifact");

        let prefix = format!("{}_{}", self.ctx.job_id(), self.ctx.req_id());
        let spooled = match spool(pcap, &prefix, "_cuckoo_pcap").await {
            Ok(spooled) => spooled,
            Err(SpoolError::Body(e)) => return self.fail_or_record(e),
            Err(SpoolError::Io(e)) => {
                warn!(error = %e, "cannot write packet capture scratch file, skipped");
                return Ok(());
            }
        };
        let body = match file_stream(spooled.file.path()).await {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "cannot read packet capture scratch file, skipped");
                return Ok(());
            }
        };

        match self.ctx.save_in_data_store(body).await {
            Ok(id) => {
                self.ctx.add_reference(keys::PCAP, id);
                self.ctx.add_attribute(keys::PCAP_MD5, &spooled.digests.md5);
                self.ctx.add_attribute(keys::PCAP_SHA1, &spooled.digests.sha1);
                Ok(())
            }
            Err(StorageError::Body(e)) => {
                warn!(error = %e, "cannot read packet capture scratch file, skipped");
                Ok(())
            }
            Err(StorageError::Store(e)) => Err(TaskError::Storage(e)),
        }
    }
}
