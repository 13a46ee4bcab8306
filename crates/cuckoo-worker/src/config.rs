//! Worker configuration, built once at start-up and shared read-only.

use std::path::PathBuf;
use std::time::Duration;

use cuckoo_core::{CuckooError, Result};
use serde::{Deserialize, Serialize};

/// Settings shared by every analysis a worker runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Directory where submitted files are materialized
    pub proc_path: PathBuf,
    /// Delete sandbox-side task data after collection
    pub clean_job_data: bool,
    /// Seconds between status polls
    pub poll_interval_secs: u64,
    /// Length in seconds of one `retry_wait` unit
    pub retry_wait_unit_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            proc_path: PathBuf::from("/tmp"),
            clean_job_data: false,
            poll_interval_secs: 30,
            retry_wait_unit_secs: 60,
        }
    }
}

impl WorkerConfig {
    /// Pause between two status polls
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Pause before resubmitting, `retry_wait` in request units (minutes)
    #[must_use]
    pub fn retry_wait(&self, retry_wait: u32) -> Duration {
        Duration::from_secs(self.retry_wait_unit_secs.saturating_mul(u64::from(retry_wait)))
    }

    /// Check that the processing directory exists
    pub fn validate(&self) -> Result<()> {
        if self.proc_path.is_dir() {
            Ok(())
        } else {
            Err(CuckooError::Config(format!(
                "processing path does not exist: {}",
                self.proc_path.display()
            )))
        }
    }
}
