//! # cuckoo-cli
//!
//! Command-line runner for the Cuckoo sandbox worker.
//!
//! ## Commands
//!
//! - **analyze**: submit a file or URL, wait for the report, score it and
//!   save the selected artifacts into a directory
//! - **score**: classify a JSON report already on disk

pub mod cli;
pub mod config;
pub mod store;

pub use cli::run;
