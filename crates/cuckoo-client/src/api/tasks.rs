//! Task submission, status and deletion endpoints.

use std::path::Path;

use crate::CuckooClient;
use cuckoo_core::{CuckooError, Result, SubmitResponse, TaskId, TaskInfo, TaskView};
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use tracing::{info, warn};

const CREATE_FILE: &str = "/tasks/create/file";
const CREATE_URL: &str = "/tasks/create/url";
const VIEW: &str = "/tasks/view";
const DELETE: &str = "/tasks/delete";

/// Task API endpoints
pub struct TasksApi<'a> {
    client: &'a CuckooClient,
}

impl<'a> TasksApi<'a> {
    pub(crate) const fn new(client: &'a CuckooClient) -> Self {
        Self { client }
    }

    /// Submit a local file for analysis.
    ///
    /// `params` are sent as extra form fields next to the `file` part.
    pub async fn create_file(&self, file: &Path, params: &[(&str, String)]) -> Result<TaskId> {
        let bytes = tokio::fs::read(file).await?;
        let file_name = file
            .file_name()
            .map_or_else(|| "sample".to_string(), |n| n.to_string_lossy().into_owned());

        let form = params
            .iter()
            .fold(Form::new(), |form, (name, value)| form.text((*name).to_string(), value.clone()))
            .part("file", Part::bytes(bytes).file_name(file_name));

        let body = self.client.post_multipart(CREATE_FILE, form).await?;
        parse_task_id(&body)
    }

    /// Submit a URL for analysis
    pub async fn create_url(&self, url: &str, params: &[(&str, String)]) -> Result<TaskId> {
        let mut fields = Vec::with_capacity(params.len() + 1);
        fields.push(("url", url.to_string()));
        fields.extend(params.iter().cloned());

        let body = self.client.post_form(CREATE_URL, &fields).await?;
        parse_task_id(&body)
    }

    /// Current state of a task
    pub async fn view(&self, task_id: TaskId) -> Result<TaskInfo> {
        let view: TaskView = self.client.get_json(&format!("{VIEW}/{task_id}")).await?;
        Ok(view.task)
    }

    /// Delete the sandbox-side data of a task.
    ///
    /// Best effort: the outcome is logged, never returned.
    pub async fn delete(&self, task_id: TaskId) {
        let response = match self.client.get(&format!("{DELETE}/{task_id}")).await {
            Ok(response) => response,
            Err(e) => {
                warn!(task_id = %task_id, "error deleting task data: {e}");
                return;
            }
        };

        match response.status() {
            StatusCode::OK => info!(task_id = %task_id, "task data deleted"),
            StatusCode::NOT_FOUND => {
                warn!(task_id = %task_id, "error deleting task data, task not found");
            }
            StatusCode::INTERNAL_SERVER_ERROR => {
                warn!(task_id = %task_id, "error deleting task data, could not delete task data");
            }
            other => warn!(
                task_id = %task_id,
                status = other.as_u16(),
                "error deleting task data, unknown status code"
            ),
        }
    }
}

fn parse_task_id(body: &str) -> Result<TaskId> {
    serde_json::from_str::<SubmitResponse>(body)
        .map(|resp| resp.task_id)
        .map_err(|e| CuckooError::SubmissionRejected(format!("{e}: {body}")))
}
