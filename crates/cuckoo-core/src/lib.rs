//! Core types and scoring for the Cuckoo sandbox worker.
//!
//! This crate provides the foundations shared by the client and the worker:
//!
//! - **Types**: analysis requests, task identifiers and states, signatures,
//!   streamed artifacts
//! - **Scoring**: the [`RatingTable`] and the single-pass [`SignatureScorer`]
//!   that turns a report into a [`Classification`]
//! - **Errors**: [`CuckooError`] and its [`Result`] alias
//!
//! # Example
//!
//! ```rust,ignore
//! use cuckoo_core::{score_report, RatingTable};
//!
//! let ratings = RatingTable::load("ratings.conf".as_ref())?;
//! let report = std::fs::File::open("report.json")?;
//! let summary = score_report(std::io::BufReader::new(report), &ratings)?;
//! println!("{} ({})", summary.classification, summary.reason);
//! ```

mod error;
pub mod scoring;
pub mod types;

pub use error::{CuckooError, Result};
pub use scoring::*;
pub use types::*;
