use serde::{Deserialize, Serialize};

/// Identifier the sandbox assigns to a submitted analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub u64);

impl From<u64> for TaskId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<TaskId> for u64 {
    fn from(id: TaskId) -> Self {
        id.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Response body of a file or URL submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitResponse {
    /// Task created for the submission
    pub task_id: TaskId,
}

/// Analysis state as reported by the sandbox
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskStatus {
    /// Waiting for a free analysis machine
    Pending,
    /// Being analysed
    Running,
    /// Analysis finished, processing not yet done
    Completed,
    /// Report generated
    Reported,
    /// Any other state string
    Other(String),
}

impl TaskStatus {
    /// Returns true once the report can be fetched
    #[must_use]
    pub const fn is_reported(&self) -> bool {
        matches!(self, Self::Reported)
    }

    /// Status string as sent by the sandbox
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Reported => "reported",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for TaskStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "pending" => Self::Pending,
            "running" => Self::Running,
            "completed" => Self::Completed,
            "reported" => Self::Reported,
            _ => Self::Other(s),
        }
    }
}

impl From<&str> for TaskStatus {
    fn from(s: &str) -> Self {
        Self::from(s.to_string())
    }
}

impl From<TaskStatus> for String {
    fn from(status: TaskStatus) -> Self {
        match status {
            TaskStatus::Other(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `task` object of the task view endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskInfo {
    /// Current state
    pub status: TaskStatus,

    /// When the analysis started
    #[serde(default)]
    pub started_on: Option<String>,

    /// When the analysis finished
    #[serde(default)]
    pub completed_on: Option<String>,
}

/// Body of the task view endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskView {
    /// Task details
    pub task: TaskInfo,
}

/// Report formats the sandbox can render
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportFormat {
    /// Machine-readable report, the one that gets scored
    Json,
    /// Human-readable report
    Html,
}

impl ReportFormat {
    /// Path segment used by the report endpoint
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Html => "html",
        }
    }
}

impl std::fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
