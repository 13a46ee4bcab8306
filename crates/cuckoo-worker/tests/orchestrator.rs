use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cuckoo_core::{
    AnalysisParams, AnalysisRequest, ArtifactStream, ByteStream, ContentRef, CuckooError,
    RatingTable, RefId, ReportFormat, Result, TaskId, TaskInfo, TaskStatus,
};
use cuckoo_worker::{
    keys, JobContext, Sandbox, StorageError, TaskError, TaskOutcome, TaskState, Wait, Worker,
    WorkerConfig,
};
use futures_util::StreamExt;

const REPORT: &str = r#"{
    "info": {"id": 1},
    "signatures": [
        {"name": "injection_runpe", "severity": 3, "families": [], "alert": false,
         "data": [{"process_id": 4}, {"process_id": 4}]},
        {"name": "unknown_sig", "data": [{"process_id": 4}]}
    ],
    "behavior": {"processes": []}
}"#;

/// Sandbox answering from scripted queues and logging every call
#[derive(Default)]
struct FakeSandbox {
    submits: Mutex<VecDeque<Result<TaskId>>>,
    statuses: Mutex<VecDeque<Result<TaskInfo>>>,
    never_reported: bool,
    failing: Vec<&'static str>,
    pcap: Vec<u8>,
    calls: Mutex<Vec<String>>,
    submitted_files: Mutex<Vec<(String, Vec<u8>)>>,
}

impl FakeSandbox {
    fn log(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    fn with_submits(self, submits: Vec<Result<TaskId>>) -> Self {
        *self.submits.lock().unwrap() = submits.into();
        self
    }

    fn with_statuses(self, statuses: Vec<Result<TaskInfo>>) -> Self {
        *self.statuses.lock().unwrap() = statuses.into();
        self
    }

    fn artifact(&self, name: &'static str, body: Vec<u8>) -> Result<ArtifactStream> {
        if self.failing.contains(&name) {
            Err(CuckooError::UnexpectedStatus { code: 500 })
        } else {
            Ok(ArtifactStream::from_bytes(200, body))
        }
    }
}

fn reported(started: Option<&str>, completed: Option<&str>) -> TaskInfo {
    TaskInfo {
        status: TaskStatus::Reported,
        started_on: started.map(str::to_string),
        completed_on: completed.map(str::to_string),
    }
}

fn running() -> TaskInfo {
    TaskInfo {
        status: TaskStatus::Running,
        started_on: None,
        completed_on: None,
    }
}

#[async_trait]
impl Sandbox for FakeSandbox {
    async fn submit_file(&self, file: &Path, _params: &[(&str, String)]) -> Result<TaskId> {
        let name = file.file_name().unwrap().to_string_lossy().into_owned();
        let content = std::fs::read(file).unwrap();
        self.log(format!("submit_file {name}"));
        self.submitted_files.lock().unwrap().push((name, content));
        self.submits.lock().unwrap().pop_front().unwrap_or(Ok(TaskId(1)))
    }

    async fn submit_url(&self, url: &str, params: &[(&str, String)]) -> Result<TaskId> {
        let fields: Vec<String> = params.iter().map(|(k, v)| format!("{k}={v}")).collect();
        self.log(format!("submit_url {url} {}", fields.join("&")).trim_end().to_string());
        self.submits.lock().unwrap().pop_front().unwrap_or(Ok(TaskId(1)))
    }

    async fn status(&self, task_id: TaskId) -> Result<TaskInfo> {
        self.log(format!("status {task_id}"));
        if self.never_reported {
            return Ok(running());
        }
        self.statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(reported(Some("2024-03-01 12:00:00"), Some("2024-03-01 12:04:10"))))
    }

    async fn report(&self, task_id: TaskId, format: ReportFormat) -> Result<ArtifactStream> {
        self.log(format!("report {task_id} {format}"));
        match format {
            ReportFormat::Json => self.artifact("json", REPORT.as_bytes().to_vec()),
            ReportFormat::Html => self.artifact("html", b"<html></html>".to_vec()),
        }
    }

    async fn pcap(&self, task_id: TaskId) -> Result<ArtifactStream> {
        self.log(format!("pcap {task_id}"));
        self.artifact("pcap", self.pcap.clone())
    }

    async fn screenshots(&self, task_id: TaskId) -> Result<ArtifactStream> {
        self.log(format!("screenshots {task_id}"));
        self.artifact("screenshots", b"PK\x03\x04".to_vec())
    }

    async fn delete_task_data(&self, task_id: TaskId) {
        self.log(format!("delete {task_id}"));
    }
}

/// Job context keeping everything in memory
#[derive(Default)]
struct RecordingContext {
    files: HashMap<u64, Vec<u8>>,
    stored: Vec<Vec<u8>>,
    attributes: Vec<(String, String)>,
    references: Vec<(String, RefId)>,
    refuse_store: bool,
}

impl RecordingContext {
    fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn reference_keys(&self) -> Vec<&str> {
        self.references.iter().map(|(k, _)| k.as_str()).collect()
    }

    fn stored_under(&self, key: &str) -> Option<&[u8]> {
        let (_, id) = self.references.iter().find(|(k, _)| k == key)?;
        let index = usize::try_from(id.0).ok()?;
        self.stored.get(index).map(Vec::as_slice)
    }
}

#[async_trait]
impl JobContext for RecordingContext {
    fn job_id(&self) -> String {
        "42".into()
    }

    fn req_id(&self) -> String {
        "7".into()
    }

    async fn file_bytes(&mut self, content: ContentRef) -> std::result::Result<Vec<u8>, StorageError> {
        self.files
            .get(&content.0)
            .cloned()
            .ok_or_else(|| StorageError::store(format!("no content {}", content.0)))
    }

    async fn save_in_data_store(
        &mut self,
        mut data: ByteStream,
    ) -> std::result::Result<RefId, StorageError> {
        if self.refuse_store {
            return Err(StorageError::store("store offline"));
        }
        let mut bytes = Vec::new();
        while let Some(chunk) = data.next().await {
            bytes.extend_from_slice(&chunk.map_err(StorageError::Body)?);
        }
        self.stored.push(bytes);
        Ok(RefId(self.stored.len() as u64 - 1))
    }

    fn add_attribute(&mut self, key: &str, value: &str) {
        self.attributes.push((key.to_string(), value.to_string()));
    }

    fn add_reference(&mut self, key: &str, id: RefId) {
        self.references.push((key.to_string(), id));
    }
}

fn ratings() -> Arc<RatingTable> {
    Arc::new([("injection_runpe", 2.0), ("network_http", 0.3)].into_iter().collect())
}

fn worker(sandbox: FakeSandbox) -> Worker<FakeSandbox> {
    Worker::new(sandbox, ratings(), WorkerConfig::default())
}

fn params(pairs: &[(&str, &str)]) -> AnalysisParams {
    AnalysisParams::from_pairs(pairs.iter().copied()).unwrap()
}

fn url_request(pairs: &[(&str, &str)]) -> AnalysisRequest {
    AnalysisRequest::url("http://example.com", params(pairs))
}

fn down() -> Result<TaskId> {
    Err(CuckooError::UnexpectedStatus { code: 500 })
}

#[tokio::test(start_paused = true)]
async fn test_url_analysis_with_default_outputs() {
    let worker = worker(FakeSandbox::default());
    let mut ctx = RecordingContext::default();

    let outcome = worker
        .process(url_request(&[("retry", "0")]), &mut ctx, Wait::uncancellable())
        .await
        .unwrap();

    assert_eq!(outcome, TaskOutcome::Completed);
    assert_eq!(ctx.attribute(keys::CLASSIFICATION), Some("malicious"));
    assert_eq!(ctx.attribute(keys::CLASSIFICATION_REASON), Some("injection_runpe"));
    assert_eq!(ctx.attribute(keys::TIME_START), Some("2024-03-01 12:00:00"));
    assert_eq!(ctx.attribute(keys::TIME_STOP), Some("2024-03-01 12:04:10"));
    assert_eq!(ctx.attribute(keys::ERROR), None);
    assert_eq!(ctx.reference_keys(), vec![keys::REPORT_JSON, keys::SCREENSHOT]);
    assert_eq!(ctx.stored_under(keys::REPORT_JSON), Some(REPORT.as_bytes()));
    assert_eq!(
        worker.sandbox().calls(),
        vec![
            "submit_url http://example.com",
            "status 1",
            "report 1 json",
            "report 1 json",
            "screenshots 1",
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_url_analysis_json_report_only() {
    let worker = worker(FakeSandbox::default());
    let mut ctx = RecordingContext::default();

    let request = url_request(&[("retry", "0"), ("save_screenshots", "false")]);
    let outcome = worker
        .process(request, &mut ctx, Wait::uncancellable())
        .await
        .unwrap();

    assert_eq!(outcome, TaskOutcome::Completed);
    assert_eq!(ctx.attribute(keys::CLASSIFICATION), Some("malicious"));
    assert_eq!(ctx.reference_keys(), vec![keys::REPORT_JSON]);
    assert_eq!(worker.sandbox().count("pcap"), 0);
    assert_eq!(worker.sandbox().count("report 1 html"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_sandbox_fields_forwarded() {
    let worker = worker(FakeSandbox::default());
    let mut ctx = RecordingContext::default();

    let request = url_request(&[("timeout", "120"), ("vm_id", "win7"), ("save_screenshots", "0")]);
    worker
        .process(request, &mut ctx, Wait::uncancellable())
        .await
        .unwrap();

    assert_eq!(
        worker.sandbox().calls()[0],
        "submit_url http://example.com timeout=120&machine=win7"
    );
}

#[tokio::test(start_paused = true)]
async fn test_retry_bound() {
    let sandbox = FakeSandbox::default().with_submits(vec![down(), down(), down(), down(), down()]);
    let worker = worker(sandbox);
    let mut ctx = RecordingContext::default();

    let start = tokio::time::Instant::now();
    let outcome = worker
        .process(url_request(&[("retry", "3")]), &mut ctx, Wait::uncancellable())
        .await
        .unwrap();

    assert_eq!(outcome, TaskOutcome::Abandoned);
    assert_eq!(worker.sandbox().count("submit_url"), 4);
    assert_eq!(worker.sandbox().count("status"), 0);
    assert_eq!(start.elapsed(), Duration::from_secs(3 * 5 * 60));
    assert_eq!(ctx.attribute(keys::ERROR), Some("unexpected response status: 500"));
}

#[tokio::test(start_paused = true)]
async fn test_retry_recovers() {
    let sandbox = FakeSandbox::default().with_submits(vec![down(), Ok(TaskId(9))]);
    let worker = worker(sandbox);
    let mut ctx = RecordingContext::default();

    let outcome = worker
        .process(url_request(&[("retry_wait", "1")]), &mut ctx, Wait::uncancellable())
        .await
        .unwrap();

    assert_eq!(outcome, TaskOutcome::Completed);
    assert_eq!(worker.sandbox().count("submit_url"), 2);
    assert_eq!(worker.sandbox().count("status 9"), 1);
    assert_eq!(ctx.attribute(keys::ERROR), None);
}

#[tokio::test(start_paused = true)]
async fn test_no_retry_when_disabled() {
    let sandbox = FakeSandbox::default().with_submits(vec![down(), down()]);
    let worker = worker(sandbox);
    let mut ctx = RecordingContext::default();

    let start = tokio::time::Instant::now();
    let outcome = worker
        .process(url_request(&[("retry", "0")]), &mut ctx, Wait::uncancellable())
        .await
        .unwrap();

    assert_eq!(outcome, TaskOutcome::Abandoned);
    assert_eq!(worker.sandbox().count("submit_url"), 1);
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_rejected_submission_not_retried() {
    let sandbox = FakeSandbox::default()
        .with_submits(vec![Err(CuckooError::SubmissionRejected("no task_id".into()))]);
    let worker = worker(sandbox);
    let mut ctx = RecordingContext::default();

    let outcome = worker
        .process(url_request(&[("retry", "3")]), &mut ctx, Wait::uncancellable())
        .await
        .unwrap();

    assert_eq!(outcome, TaskOutcome::Abandoned);
    assert_eq!(worker.sandbox().count("submit_url"), 1);
    assert!(ctx.attribute(keys::ERROR).unwrap().contains("no task_id"));
}

#[tokio::test(start_paused = true)]
async fn test_fail_on_error_submission() {
    let sandbox = FakeSandbox::default().with_submits(vec![down()]);
    let worker = worker(sandbox);
    let mut ctx = RecordingContext::default();

    let err = worker
        .process(
            url_request(&[("retry", "0"), ("fail_on_error", "true")]),
            &mut ctx,
            Wait::uncancellable(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, TaskError::Sandbox(CuckooError::UnexpectedStatus { code: 500 })));
    assert_eq!(ctx.attribute(keys::ERROR), None);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_retry_wait() {
    let sandbox = FakeSandbox::default().with_submits(vec![down(), down()]);
    let worker = worker(sandbox);
    let mut ctx = RecordingContext::default();
    let (canceller, wait) = Wait::new();

    let (outcome, ()) = tokio::join!(
        worker.process(url_request(&[("retry", "3")]), &mut ctx, wait),
        async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            canceller.cancel();
        }
    );

    assert_eq!(
        outcome.unwrap(),
        TaskOutcome::Cancelled { during: TaskState::Submitting }
    );
    assert_eq!(worker.sandbox().count("submit_url"), 1);
    assert!(ctx.attributes.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_polls_until_reported() {
    let sandbox = FakeSandbox::default().with_statuses(vec![
        Ok(running()),
        Ok(TaskInfo { status: TaskStatus::Pending, started_on: None, completed_on: None }),
        Ok(TaskInfo { status: TaskStatus::Completed, started_on: None, completed_on: None }),
        Ok(reported(Some("2024-03-01 12:00:00"), Some("2024-03-01 12:04:10"))),
    ]);
    let worker = worker(sandbox);
    let mut ctx = RecordingContext::default();

    let start = tokio::time::Instant::now();
    worker
        .process(url_request(&[]), &mut ctx, Wait::uncancellable())
        .await
        .unwrap();

    assert_eq!(worker.sandbox().count("status"), 4);
    assert_eq!(start.elapsed(), Duration::from_secs(4 * 30));
}

#[tokio::test(start_paused = true)]
async fn test_polling_never_times_out() {
    let sandbox = FakeSandbox {
        never_reported: true,
        ..FakeSandbox::default()
    };
    let worker = worker(sandbox);
    let mut ctx = RecordingContext::default();

    let run = worker.process(url_request(&[]), &mut ctx, Wait::uncancellable());
    let still_polling = tokio::time::timeout(Duration::from_secs(3605), run).await;

    assert!(still_polling.is_err());
    assert_eq!(worker.sandbox().count("status"), 120);
    assert_eq!(worker.sandbox().count("report"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_polling() {
    let sandbox = FakeSandbox {
        never_reported: true,
        ..FakeSandbox::default()
    };
    let worker = worker(sandbox);
    let mut ctx = RecordingContext::default();
    let (canceller, wait) = Wait::new();

    let (outcome, ()) = tokio::join!(
        worker.process(url_request(&[]), &mut ctx, wait),
        async {
            tokio::time::sleep(Duration::from_secs(95)).await;
            canceller.cancel();
        }
    );

    assert_eq!(outcome.unwrap(), TaskOutcome::Cancelled { during: TaskState::Polling });
    assert_eq!(worker.sandbox().count("status"), 3);
    assert!(ctx.attributes.is_empty());
    assert!(ctx.references.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_poll_failure_is_recorded_and_collection_proceeds() {
    let sandbox = FakeSandbox::default()
        .with_statuses(vec![Err(CuckooError::TaskInfo("missing task".into()))]);
    let worker = worker(sandbox);
    let mut ctx = RecordingContext::default();

    let outcome = worker
        .process(url_request(&[]), &mut ctx, Wait::uncancellable())
        .await
        .unwrap();

    assert_eq!(outcome, TaskOutcome::Completed);
    assert_eq!(worker.sandbox().count("status"), 1);
    assert!(ctx.attribute(keys::ERROR).unwrap().contains("missing task"));
    assert_eq!(ctx.attribute(keys::TIME_START), None);
    assert_eq!(ctx.attribute(keys::CLASSIFICATION), Some("malicious"));
}

#[tokio::test(start_paused = true)]
async fn test_poll_failure_with_fail_on_error() {
    let sandbox = FakeSandbox::default()
        .with_statuses(vec![Err(CuckooError::UnexpectedStatus { code: 404 })]);
    let worker = worker(sandbox);
    let mut ctx = RecordingContext::default();

    let err = worker
        .process(url_request(&[("fail_on_error", "yes")]), &mut ctx, Wait::uncancellable())
        .await
        .unwrap_err();

    assert!(matches!(err, TaskError::Sandbox(_)));
    assert_eq!(worker.sandbox().count("report"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_completion_time_fallback() {
    let sandbox = FakeSandbox::default().with_statuses(vec![Ok(reported(None, None))]);
    let worker = worker(sandbox);
    let mut ctx = RecordingContext::default();

    worker
        .process(url_request(&[]), &mut ctx, Wait::uncancellable())
        .await
        .unwrap();

    assert_eq!(ctx.attribute(keys::TIME_START), None);
    let stop = ctx.attribute(keys::TIME_STOP).unwrap();
    assert!(chrono::NaiveDateTime::parse_from_str(stop, "%Y-%m-%d %H:%M:%S").is_ok(), "{stop}");
}

#[tokio::test(start_paused = true)]
async fn test_partial_artifact_failure() {
    let sandbox = FakeSandbox {
        failing: vec!["pcap"],
        ..FakeSandbox::default()
    };
    let worker = worker(sandbox);
    let mut ctx = RecordingContext::default();

    let request = url_request(&[("save_report_html", "true"), ("save_pcap", "true")]);
    let outcome = worker
        .process(request, &mut ctx, Wait::uncancellable())
        .await
        .unwrap();

    assert_eq!(outcome, TaskOutcome::Completed);
    assert_eq!(
        ctx.reference_keys(),
        vec![keys::REPORT_HTML, keys::REPORT_JSON, keys::SCREENSHOT]
    );
    assert_eq!(ctx.attribute(keys::ERROR), Some("unexpected response status: 500"));
    assert_eq!(ctx.attribute(keys::PCAP_MD5), None);
}

#[tokio::test(start_paused = true)]
async fn test_artifact_failure_with_fail_on_error_stops_collection() {
    let sandbox = FakeSandbox {
        failing: vec!["html"],
        ..FakeSandbox::default()
    };
    let worker = worker(sandbox);
    let mut ctx = RecordingContext::default();

    let request = url_request(&[
        ("save_report_html", "true"),
        ("save_pcap", "true"),
        ("fail_on_error", "true"),
    ]);
    let err = worker
        .process(request.clean_job_data(true), &mut ctx, Wait::uncancellable())
        .await
        .unwrap_err();

    assert!(matches!(err, TaskError::Sandbox(_)));
    assert_eq!(worker.sandbox().calls().last().map(String::as_str), Some("report 1 html"));
    assert!(ctx.references.is_empty());
    assert_eq!(worker.sandbox().count("delete"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_unscorable_report_is_recorded() {
    let sandbox = FakeSandbox {
        failing: vec!["json"],
        ..FakeSandbox::default()
    };
    let worker = worker(sandbox);
    let mut ctx = RecordingContext::default();

    let outcome = worker
        .process(url_request(&[]), &mut ctx, Wait::uncancellable())
        .await
        .unwrap();

    assert_eq!(outcome, TaskOutcome::Completed);
    assert_eq!(ctx.attribute(keys::CLASSIFICATION), None);
    assert_eq!(ctx.reference_keys(), vec![keys::SCREENSHOT]);
    let errors = ctx.attributes.iter().filter(|(k, _)| k == keys::ERROR).count();
    assert_eq!(errors, 2);
}

#[tokio::test(start_paused = true)]
async fn test_pcap_digests() {
    let sandbox = FakeSandbox {
        pcap: b"hello world".to_vec(),
        ..FakeSandbox::default()
    };
    let worker = worker(sandbox);
    let mut ctx = RecordingContext::default();

    let request = url_request(&[("save_pcap", "true"), ("save_screenshots", "false")]);
    worker
        .process(request, &mut ctx, Wait::uncancellable())
        .await
        .unwrap();

    assert_eq!(ctx.reference_keys(), vec![keys::REPORT_JSON, keys::PCAP]);
    assert_eq!(ctx.stored_under(keys::PCAP), Some(&b"hello world"[..]));
    assert_eq!(ctx.attribute(keys::PCAP_MD5), Some("5eb63bbbe01eeed093cb22bb8f5acdc3"));
    assert_eq!(
        ctx.attribute(keys::PCAP_SHA1),
        Some("2aae6c35c94fcfb415dbe95f408b9ce91ee846ed")
    );
}

#[tokio::test(start_paused = true)]
async fn test_cleanup_deletes_once_after_collection() {
    let worker = worker(FakeSandbox::default());
    let mut ctx = RecordingContext::default();

    let request = url_request(&[("save_pcap", "true")]).clean_job_data(true);
    worker
        .process(request, &mut ctx, Wait::uncancellable())
        .await
        .unwrap();

    let calls = worker.sandbox().calls();
    assert_eq!(worker.sandbox().count("delete"), 1);
    assert_eq!(calls.last().map(String::as_str), Some("delete 1"));
}

#[tokio::test(start_paused = true)]
async fn test_cleanup_from_worker_config() {
    let config = WorkerConfig {
        clean_job_data: true,
        ..WorkerConfig::default()
    };
    let worker = Worker::new(
        FakeSandbox::default().with_submits(vec![Ok(TaskId(5))]),
        ratings(),
        config,
    );
    let mut ctx = RecordingContext::default();

    worker
        .process(url_request(&[]), &mut ctx, Wait::uncancellable())
        .await
        .unwrap();

    assert_eq!(worker.sandbox().calls().last().map(String::as_str), Some("delete 5"));
}

#[tokio::test(start_paused = true)]
async fn test_no_cleanup_by_default() {
    let worker = worker(FakeSandbox::default());
    let mut ctx = RecordingContext::default();

    worker
        .process(url_request(&[]), &mut ctx, Wait::uncancellable())
        .await
        .unwrap();

    assert_eq!(worker.sandbox().count("delete"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_file_is_materialized_under_md5_name() {
    let proc_dir = tempfile::tempdir().unwrap();
    let config = WorkerConfig {
        proc_path: proc_dir.path().to_path_buf(),
        ..WorkerConfig::default()
    };
    let worker = Worker::new(FakeSandbox::default(), ratings(), config);
    let mut ctx = RecordingContext::default();
    ctx.files.insert(3, b"hello world".to_vec());

    let request = AnalysisRequest::content(ContentRef(3), None, AnalysisParams::default());
    worker
        .process(request, &mut ctx, Wait::uncancellable())
        .await
        .unwrap();

    let submitted = worker.sandbox().submitted_files.lock().unwrap().clone();
    assert_eq!(
        submitted,
        vec![("5eb63bbbe01eeed093cb22bb8f5acdc3".to_string(), b"hello world".to_vec())]
    );
    assert!(std::fs::read_dir(proc_dir.path()).unwrap().next().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_file_keeps_given_name() {
    let proc_dir = tempfile::tempdir().unwrap();
    let config = WorkerConfig {
        proc_path: proc_dir.path().to_path_buf(),
        ..WorkerConfig::default()
    };
    let worker = Worker::new(FakeSandbox::default(), ratings(), config);
    let mut ctx = RecordingContext::default();
    ctx.files.insert(3, b"MZ".to_vec());

    let request = AnalysisRequest::content(
        ContentRef(3),
        Some("../../invoice.exe".into()),
        AnalysisParams::default(),
    );
    worker
        .process(request, &mut ctx, Wait::uncancellable())
        .await
        .unwrap();

    assert_eq!(worker.sandbox().calls()[0], "submit_file invoice.exe");
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_files_with_same_name_stay_apart() {
    let proc_dir = tempfile::tempdir().unwrap();
    let config = WorkerConfig {
        proc_path: proc_dir.path().to_path_buf(),
        ..WorkerConfig::default()
    };
    let sandbox = FakeSandbox::default().with_submits(vec![down(), Ok(TaskId(1)), Ok(TaskId(2))]);
    let worker = Worker::new(sandbox, ratings(), config);

    let mut first_ctx = RecordingContext::default();
    first_ctx.files.insert(3, b"AAAA".to_vec());
    let mut second_ctx = RecordingContext::default();
    second_ctx.files.insert(3, b"BBBB".to_vec());
    let request = || {
        AnalysisRequest::content(
            ContentRef(3),
            Some("sample.exe".into()),
            params(&[("retry_wait", "1")]),
        )
    };

    // The second request is submitted while the first one waits to retry.
    let (first, second) = tokio::join!(
        worker.process(request(), &mut first_ctx, Wait::uncancellable()),
        async {
            tokio::time::sleep(Duration::from_millis(500)).await;
            worker
                .process(request(), &mut second_ctx, Wait::uncancellable())
                .await
        }
    );

    assert_eq!(first.unwrap(), TaskOutcome::Completed);
    assert_eq!(second.unwrap(), TaskOutcome::Completed);
    assert_eq!(first_ctx.attribute(keys::ERROR), None);
    assert_eq!(second_ctx.attribute(keys::ERROR), None);

    let submitted = worker.sandbox().submitted_files.lock().unwrap().clone();
    assert_eq!(
        submitted,
        vec![
            ("sample.exe".to_string(), b"AAAA".to_vec()),
            ("sample.exe".to_string(), b"BBBB".to_vec()),
            ("sample.exe".to_string(), b"AAAA".to_vec()),
        ]
    );
    assert!(std::fs::read_dir(proc_dir.path()).unwrap().next().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_missing_content_is_storage_error() {
    let worker = worker(FakeSandbox::default());
    let mut ctx = RecordingContext::default();

    let request = AnalysisRequest::content(ContentRef(8), None, AnalysisParams::default());
    let err = worker
        .process(request, &mut ctx, Wait::uncancellable())
        .await
        .unwrap_err();

    assert!(matches!(err, TaskError::Storage(_)));
    assert!(worker.sandbox().calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_store_failure_is_fatal() {
    let worker = worker(FakeSandbox::default());
    let mut ctx = RecordingContext {
        refuse_store: true,
        ..RecordingContext::default()
    };

    let err = worker
        .process(url_request(&[]), &mut ctx, Wait::uncancellable())
        .await
        .unwrap_err();

    assert!(matches!(err, TaskError::Storage(ref m) if m == "store offline"));
    assert_eq!(ctx.attribute(keys::CLASSIFICATION), Some("malicious"));
}

#[tokio::test(start_paused = true)]
async fn test_invalid_url_query_is_encoded() {
    let worker = worker(FakeSandbox::default());
    let mut ctx = RecordingContext::default();

    let request = AnalysisRequest::url("http://example.com/p?q=a b", params(&[("save_screenshots", "false")]));
    worker
        .process(request, &mut ctx, Wait::uncancellable())
        .await
        .unwrap();

    assert_eq!(worker.sandbox().calls()[0], "submit_url http://example.com/p?q%3Da+b");
}
