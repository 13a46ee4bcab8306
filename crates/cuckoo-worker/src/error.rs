use cuckoo_core::CuckooError;
use thiserror::Error;

/// Why an analysis ended with a fatal failure
#[derive(Error, Debug)]
pub enum TaskError {
    /// A sandbox failure escalated because `fail_on_error` is set
    #[error("sandbox failure: {0}")]
    Sandbox(#[source] CuckooError),

    /// The submitted file could not be prepared locally
    #[error("cannot prepare analysis input: {0}")]
    Resource(String),

    /// The job context refused to store or serve data
    #[error("job storage failure: {0}")]
    Storage(String),
}

/// Failure reported by a [`JobContext`](crate::JobContext) store operation
#[derive(Error, Debug)]
pub enum StorageError {
    /// Reading the stream being stored failed on the sandbox side
    #[error("artifact transfer failed: {0}")]
    Body(#[source] CuckooError),

    /// The store itself failed
    #[error("{0}")]
    Store(String),
}

impl StorageError {
    /// Store failure with a message
    pub fn store(message: impl std::fmt::Display) -> Self {
        Self::Store(message.to_string())
    }
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        Self::Store(e.to_string())
    }
}
