//! Cuckoo sandbox analysis worker.
//!
//! Drives one work item at a time through submission, status polling, report
//! scoring and artifact collection:
//!
//! - [`Worker`] / [`CuckooTask`]: the analysis state machine
//! - [`Sandbox`]: the REST operations it needs, implemented by
//!   [`cuckoo_client::CuckooClient`]
//! - [`JobContext`]: storage and result sink supplied by the host pipeline
//! - [`Wait`] / [`Canceller`]: cancellable sleeps for retry and polling
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use cuckoo_worker::{Wait, Worker, WorkerConfig};
//!
//! let client = cuckoo_client::CuckooClient::new("http://localhost:1337")?;
//! let ratings = Arc::new(cuckoo_core::RatingTable::load("ratings.conf".as_ref())?);
//! let worker = Worker::new(client, ratings, WorkerConfig::default());
//!
//! let (canceller, wait) = Wait::new();
//! let outcome = worker.process(request, &mut ctx, wait).await?;
//! ```

mod artifact;
mod config;
mod context;
mod error;
mod report;
mod sandbox;
mod task;
mod url;
mod wait;

pub use artifact::{md5_hex, ArtifactDigest, Digests};
pub use config::WorkerConfig;
pub use context::{keys, JobContext};
pub use error::{StorageError, TaskError};
pub use report::score_stream;
pub use sandbox::Sandbox;
pub use task::{CuckooTask, TaskOutcome, TaskState, Worker};
pub use url::{is_valid_uri, prepare_url};
pub use wait::{Canceller, Wait, WaitOutcome};
