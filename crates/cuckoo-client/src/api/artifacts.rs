//! Report, packet capture and screenshot endpoints.

use crate::CuckooClient;
use cuckoo_core::{ArtifactStream, ReportFormat, Result, TaskId};

/// Artifact API endpoints
pub struct ArtifactsApi<'a> {
    client: &'a CuckooClient,
}

impl<'a> ArtifactsApi<'a> {
    pub(crate) const fn new(client: &'a CuckooClient) -> Self {
        Self { client }
    }

    /// Analysis report in the given format
    pub async fn report(&self, task_id: TaskId, format: ReportFormat) -> Result<ArtifactStream> {
        self.client
            .get_stream(&format!("/tasks/report/{task_id}/{format}"))
            .await
    }

    /// Network traffic captured during the analysis
    pub async fn pcap(&self, task_id: TaskId) -> Result<ArtifactStream> {
        self.client.get_stream(&format!("/pcap/get/{task_id}")).await
    }

    /// Archive of screenshots taken during the analysis
    pub async fn screenshots(&self, task_id: TaskId) -> Result<ArtifactStream> {
        self.client
            .get_stream(&format!("/tasks/screenshots/{task_id}"))
            .await
    }
}
