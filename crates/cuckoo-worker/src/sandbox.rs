//! The orchestrator's view of the sandbox REST surface.

use std::path::Path;

use async_trait::async_trait;
use cuckoo_client::CuckooClient;
use cuckoo_core::{ArtifactStream, ReportFormat, Result, TaskId, TaskInfo};

/// Operations the orchestrator needs from a sandbox.
///
/// Implemented by [`CuckooClient`]; tests substitute scripted fakes.
#[async_trait]
pub trait Sandbox: Send + Sync {
    /// Submit a local file with extra form fields
    async fn submit_file(&self, file: &Path, params: &[(&str, String)]) -> Result<TaskId>;

    /// Submit a URL with extra form fields
    async fn submit_url(&self, url: &str, params: &[(&str, String)]) -> Result<TaskId>;

    /// Current state of a task
    async fn status(&self, task_id: TaskId) -> Result<TaskInfo>;

    /// Stream a report in the given format
    async fn report(&self, task_id: TaskId, format: ReportFormat) -> Result<ArtifactStream>;

    /// Stream the packet capture
    async fn pcap(&self, task_id: TaskId) -> Result<ArtifactStream>;

    /// Stream the screenshot archive
    async fn screenshots(&self, task_id: TaskId) -> Result<ArtifactStream>;

    /// Best-effort removal of the task's data; never fails
    async fn delete_task_data(&self, task_id: TaskId);
}

#[async_trait]
impl Sandbox for CuckooClient {
    async fn submit_file(&self, file: &Path, params: &[(&str, String)]) -> Result<TaskId> {
        self.tasks().create_file(file, params).await
    }

    async fn submit_url(&self, url: &str, params: &[(&str, String)]) -> Result<TaskId> {
        self.tasks().create_url(url, params).await
    }

    async fn status(&self, task_id: TaskId) -> Result<TaskInfo> {
        self.tasks().view(task_id).await
    }

    async fn report(&self, task_id: TaskId, format: ReportFormat) -> Result<ArtifactStream> {
        self.artifacts().report(task_id, format).await
    }

    async fn pcap(&self, task_id: TaskId) -> Result<ArtifactStream> {
        self.artifacts().pcap(task_id).await
    }

    async fn screenshots(&self, task_id: TaskId) -> Result<ArtifactStream> {
        self.artifacts().screenshots(task_id).await
    }

    async fn delete_task_data(&self, task_id: TaskId) {
        self.tasks().delete(task_id).await;
    }
}
