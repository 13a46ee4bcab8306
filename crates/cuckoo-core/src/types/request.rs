use serde::{Deserialize, Serialize};

use crate::error::{CuckooError, Result};

/// Opaque handle to bytes held by the job context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentRef(pub u64);

/// Identifier of an object stored through the job context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RefId(pub u64);

impl std::fmt::Display for RefId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What gets submitted to the sandbox
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisInput {
    /// A file held by the job context
    Content {
        /// Reference to the file bytes
        content: ContentRef,
        /// Name to give the file on submission (MD5 of the content if absent)
        filename: Option<String>,
    },
    /// A URL for the sandbox to visit
    Url(String),
}

/// Per-request analysis parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisParams {
    /// Store the packet capture
    pub save_pcap: bool,
    /// Store the JSON report
    pub save_report_json: bool,
    /// Store the HTML report
    pub save_report_html: bool,
    /// Store the screenshot archive
    pub save_screenshots: bool,
    /// Turn every sandbox failure into a fatal task error
    pub fail_on_error: bool,
    /// How many times a failed submission is sent again
    pub retry: u32,
    /// Minutes to wait between submission attempts
    pub retry_wait: u32,
    /// Analysis timeout forwarded to the sandbox
    pub timeout: Option<String>,
    /// Task priority forwarded to the sandbox
    pub priority: Option<String>,
    /// Analysis package forwarded to the sandbox
    pub package: Option<String>,
    /// Analysis machine forwarded to the sandbox (request key `vm_id`)
    pub machine: Option<String>,
}

impl Default for AnalysisParams {
    fn default() -> Self {
        Self {
            save_pcap: false,
            save_report_json: true,
            save_report_html: false,
            save_screenshots: true,
            fail_on_error: false,
            retry: 3,
            retry_wait: 5,
            timeout: None,
            priority: None,
            package: None,
            machine: None,
        }
    }
}

impl AnalysisParams {
    /// Build parameters from raw `key`/`value` pairs.
    ///
    /// Unknown keys are ignored; known keys with unparsable values fail.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut params = Self::default();
        for (key, value) in pairs {
            let (key, value) = (key.as_ref(), value.as_ref());
            match key {
                "save_pcap" => params.save_pcap = parse_bool(key, value)?,
                "save_report_json" => params.save_report_json = parse_bool(key, value)?,
                "save_report_html" => params.save_report_html = parse_bool(key, value)?,
                "save_screenshots" => params.save_screenshots = parse_bool(key, value)?,
                "fail_on_error" => params.fail_on_error = parse_bool(key, value)?,
                "retry" => params.retry = parse_count(key, value)?,
                "retry_wait" => params.retry_wait = parse_count(key, value)?,
                "timeout" => params.timeout = Some(value.to_string()),
                "priority" => params.priority = Some(value.to_string()),
                "package" => params.package = Some(value.to_string()),
                "vm_id" => params.machine = Some(value.to_string()),
                other => tracing::debug!(param = other, "ignoring unknown parameter"),
            }
        }
        Ok(params)
    }

    /// Form fields forwarded verbatim with a submission
    #[must_use]
    pub fn sandbox_fields(&self) -> Vec<(&'static str, String)> {
        [
            ("timeout", &self.timeout),
            ("priority", &self.priority),
            ("package", &self.package),
            ("machine", &self.machine),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.clone().map(|v| (name, v)))
        .collect()
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(CuckooError::parameter(name, format!("not a boolean: {value}"))),
    }
}

fn parse_count(name: &str, value: &str) -> Result<u32> {
    value
        .trim()
        .parse()
        .map_err(|e| CuckooError::parameter(name, format!("{value}: {e}")))
}

/// One unit of work for the orchestrator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRequest {
    /// File or URL to analyse
    pub input: AnalysisInput,
    /// Analysis parameters
    pub params: AnalysisParams,
    /// Delete the sandbox-side task data once everything is collected
    pub clean_job_data: bool,
}

impl AnalysisRequest {
    /// Request analysis of a URL
    #[must_use]
    pub fn url(url: impl Into<String>, params: AnalysisParams) -> Self {
        Self {
            input: AnalysisInput::Url(url.into()),
            params,
            clean_job_data: false,
        }
    }

    /// Request analysis of a file held by the job context
    #[must_use]
    pub const fn content(content: ContentRef, filename: Option<String>, params: AnalysisParams) -> Self {
        Self {
            input: AnalysisInput::Content { content, filename },
            params,
            clean_job_data: false,
        }
    }

    /// Set whether sandbox task data is deleted after collection
    #[must_use]
    pub const fn clean_job_data(mut self, clean: bool) -> Self {
        self.clean_job_data = clean;
        self
    }
}
