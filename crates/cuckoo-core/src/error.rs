use thiserror::Error;

/// Result type alias for sandbox operations
pub type Result<T> = std::result::Result<T, CuckooError>;

/// Errors that can occur while talking to the sandbox or scoring its reports
#[derive(Error, Debug)]
pub enum CuckooError {
    /// The sandbox answered with a status other than the expected one
    #[error("unexpected response status: {code}")]
    UnexpectedStatus {
        /// HTTP status code
        code: u16,
    },

    /// HTTP request or body transfer failed
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Task status payload is missing or lacks the `task`/`status` fields
    #[error("no task data: {0}")]
    TaskInfo(String),

    /// Submission returned 200 but the body carries no usable task id
    #[error("submission rejected: {0}")]
    SubmissionRejected(String),

    /// Signature has no configured weight
    #[error("no rate for: {name}")]
    RatingNotFound {
        /// Signature name that was looked up
        name: String,
    },

    /// Report stream could not be parsed
    #[error("malformed report: {0}")]
    MalformedReport(String),

    /// Rating source contains a line that is not `name=weight`
    #[error("malformed rating at line {line}: {reason}")]
    MalformedRatings {
        /// 1-based line number
        line: usize,
        /// What was wrong with it
        reason: String,
    },

    /// Invalid request parameter
    #[error("invalid parameter {name}: {reason}")]
    Parameter {
        /// Parameter name
        name: String,
        /// Why the value was refused
        reason: String,
    },

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Local I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CuckooError {
    /// Returns true if the error comes from talking to the sandbox
    #[must_use]
    pub const fn is_connectivity(&self) -> bool {
        matches!(
            self,
            Self::UnexpectedStatus { .. } | Self::Http(_) | Self::TaskInfo(_)
        )
    }

    /// Returns true if a failed submission may be sent again
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.is_connectivity()
    }

    /// Returns the HTTP status code if the sandbox answered with one
    #[must_use]
    pub const fn status_code(&self) -> Option<u16> {
        match self {
            Self::UnexpectedStatus { code } => Some(*code),
            _ => None,
        }
    }

    pub(crate) fn parameter(name: &str, reason: impl Into<String>) -> Self {
        Self::Parameter {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}
