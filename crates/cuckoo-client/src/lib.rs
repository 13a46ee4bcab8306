//! HTTP client for the Cuckoo sandbox REST API.
//!
//! This crate provides [`CuckooClient`], a connector for submitting files and
//! URLs, polling task status, streaming reports and artifacts, and deleting
//! task data.

mod client;
mod config;
pub mod api;

pub use client::{CuckooClient, CuckooClientBuilder};
pub use config::*;
pub use cuckoo_core::{CuckooError, Result};
