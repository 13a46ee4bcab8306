//! The job context: the host pipeline's side of an analysis.

use async_trait::async_trait;
use cuckoo_core::{ByteStream, ContentRef, RefId};

use crate::error::StorageError;

/// Attribute and reference keys written by the worker
pub mod keys {
    /// Verdict: benign, suspicious or malicious
    pub const CLASSIFICATION: &str = "cuckoo_classification";
    /// Signature names behind the verdict
    pub const CLASSIFICATION_REASON: &str = "cuckoo_classification_reason";
    /// When the sandbox started the analysis
    pub const TIME_START: &str = "cuckoo_time_start";
    /// When the sandbox finished the analysis
    pub const TIME_STOP: &str = "cuckoo_time_stop";
    /// MD5 of the packet capture
    pub const PCAP_MD5: &str = "cuckoo_pcap_md5";
    /// SHA-1 of the packet capture
    pub const PCAP_SHA1: &str = "cuckoo_pcap_sha1";
    /// Error recorded instead of failing the task
    pub const ERROR: &str = "cuckoo_error";

    /// Stored JSON report
    pub const REPORT_JSON: &str = "cuckoo_report_json";
    /// Stored HTML report
    pub const REPORT_HTML: &str = "cuckoo_report_html";
    /// Stored packet capture
    pub const PCAP: &str = "cuckoo_pcap";
    /// Stored screenshot archive
    pub const SCREENSHOT: &str = "cuckoo_screenshot";
}

/// Storage and result sink provided by the job pipeline for one work item.
#[async_trait]
pub trait JobContext: Send {
    /// Identifier of the job
    fn job_id(&self) -> String;

    /// Identifier of the request within the job
    fn req_id(&self) -> String;

    /// Bytes behind a content reference
    async fn file_bytes(&mut self, content: ContentRef) -> Result<Vec<u8>, StorageError>;

    /// Persist a stream, returning the identifier of the stored object
    async fn save_in_data_store(&mut self, data: ByteStream) -> Result<RefId, StorageError>;

    /// Attach a key/value result
    fn add_attribute(&mut self, key: &str, value: &str);

    /// Attach a stored object under a key
    fn add_reference(&mut self, key: &str, id: RefId);
}
