//! Configuration management.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context as _, Result};
use cuckoo_client::{ClientConfig, DEFAULT_BASE_URL};
use cuckoo_core::RatingTable;
use cuckoo_worker::WorkerConfig;
use serde::{Deserialize, Serialize};

/// Process-wide settings, read from a TOML file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the sandbox REST API.
    pub cuckoo_address: String,

    /// Directory where submitted files are written before upload.
    pub cuckoo_proc_path: PathBuf,

    /// Signature rating file (`name=weight` lines).
    pub ratings_path: PathBuf,

    /// Delete sandbox task data once artifacts are collected.
    pub clean_job_data: bool,

    /// Seconds between status polls.
    pub poll_interval_secs: u64,

    /// HTTP request timeout in seconds (0 disables it).
    pub timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        let worker = WorkerConfig::default();
        Self {
            cuckoo_address: DEFAULT_BASE_URL.to_string(),
            cuckoo_proc_path: worker.proc_path,
            ratings_path: PathBuf::from("config/ratings.conf"),
            clean_job_data: worker.clean_job_data,
            poll_interval_secs: worker.poll_interval_secs,
            timeout_secs: ClientConfig::default().timeout_secs,
        }
    }
}

impl Config {
    /// Load configuration from a file, or defaults if none is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read config file {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("invalid config file {}", path.display()))?;
        Ok(config)
    }

    /// Sandbox client settings.
    pub fn client(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.cuckoo_address.clone(),
            timeout_secs: self.timeout_secs,
            ..ClientConfig::default()
        }
    }

    /// Worker settings.
    pub fn worker(&self) -> WorkerConfig {
        WorkerConfig {
            proc_path: self.cuckoo_proc_path.clone(),
            clean_job_data: self.clean_job_data,
            poll_interval_secs: self.poll_interval_secs,
            ..WorkerConfig::default()
        }
    }

    /// Load the rating table named by the configuration.
    pub fn ratings(&self) -> Result<Arc<RatingTable>> {
        let table = RatingTable::load(&self.ratings_path)
            .with_context(|| format!("cannot load ratings from {}", self.ratings_path.display()))?;
        Ok(Arc::new(table))
    }

    /// Start-up checks: the processing path must exist.
    pub fn validate(&self) -> Result<()> {
        self.worker().validate()?;
        Ok(())
    }
}
