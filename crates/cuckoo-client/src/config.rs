//! Client configuration types.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default sandbox API address
pub const DEFAULT_BASE_URL: &str = "http://localhost:1337";

/// Connection settings for the sandbox API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the sandbox REST API
    pub base_url: String,

    /// Per-request timeout in seconds, 0 disables it
    pub timeout_secs: u64,

    /// User-Agent header
    pub user_agent: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 0,
            user_agent: None,
        }
    }
}

impl ClientConfig {
    /// Request timeout, if any
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        if self.timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.timeout_secs))
        }
    }
}
