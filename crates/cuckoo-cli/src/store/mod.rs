//! Filesystem-backed job context for one-shot runs.
//!
//! Stored objects become numbered files in the output directory; attributes
//! and references are collected and written to `result.json` at the end.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use cuckoo_core::{ByteStream, ContentRef, RefId};
use cuckoo_worker::{JobContext, StorageError};
use futures_util::StreamExt;
use serde::Serialize;
use tokio::io::AsyncWriteExt;

/// Name of the summary file written by [`DirContext::finish`]
pub const RESULT_FILE: &str = "result.json";

/// Job context writing into a directory
#[derive(Debug)]
pub struct DirContext {
    out: PathBuf,
    job_id: String,
    req_id: String,
    inputs: HashMap<u64, PathBuf>,
    objects: Vec<PathBuf>,
    attributes: Vec<Attribute>,
    references: Vec<Reference>,
}

/// One recorded attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attribute {
    /// Attribute key
    pub key: String,
    /// Attribute value
    pub value: String,
}

/// One recorded reference to a stored object
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reference {
    /// Reference key
    pub key: String,
    /// Object id
    pub id: u64,
    /// File holding the object
    pub path: PathBuf,
}

#[derive(Serialize)]
struct Summary<'a> {
    job_id: &'a str,
    req_id: &'a str,
    attributes: &'a [Attribute],
    references: &'a [Reference],
}

impl DirContext {
    /// Create the output directory if needed
    pub fn create(out: impl Into<PathBuf>, job_id: impl Into<String>, req_id: impl Into<String>) -> Result<Self> {
        let out = out.into();
        std::fs::create_dir_all(&out)
            .with_context(|| format!("cannot create output directory {}", out.display()))?;
        Ok(Self {
            out,
            job_id: job_id.into(),
            req_id: req_id.into(),
            inputs: HashMap::new(),
            objects: Vec::new(),
            attributes: Vec::new(),
            references: Vec::new(),
        })
    }

    /// Make a local file available as analysis content
    pub fn add_input(&mut self, path: impl Into<PathBuf>) -> ContentRef {
        let id = self.inputs.len() as u64;
        self.inputs.insert(id, path.into());
        ContentRef(id)
    }

    /// Attributes recorded so far
    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// References recorded so far
    pub fn references(&self) -> &[Reference] {
        &self.references
    }

    /// First value recorded for an attribute
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.key == key)
            .map(|a| a.value.as_str())
    }

    /// Write `result.json` and return its path
    pub fn finish(&self) -> Result<PathBuf> {
        let path = self.out.join(RESULT_FILE);
        let summary = Summary {
            job_id: &self.job_id,
            req_id: &self.req_id,
            attributes: &self.attributes,
            references: &self.references,
        };
        let content = serde_json::to_string_pretty(&summary)?;
        std::fs::write(&path, content)
            .with_context(|| format!("cannot write {}", path.display()))?;
        Ok(path)
    }

    fn object_path(&self, id: u64) -> PathBuf {
        self.out.join(format!("{id:03}.bin"))
    }
}

#[async_trait]
impl JobContext for DirContext {
    fn job_id(&self) -> String {
        self.job_id.clone()
    }

    fn req_id(&self) -> String {
        self.req_id.clone()
    }

    async fn file_bytes(&mut self, content: ContentRef) -> Result<Vec<u8>, StorageError> {
        let path = self
            .inputs
            .get(&content.0)
            .ok_or_else(|| StorageError::store(format!("unknown content reference {}", content.0)))?;
        Ok(tokio::fs::read(path).await?)
    }

    async fn save_in_data_store(&mut self, mut data: ByteStream) -> Result<RefId, StorageError> {
        let id = self.objects.len() as u64;
        let path = self.object_path(id);
        let mut file = tokio::fs::File::create(&path).await?;

        while let Some(chunk) = data.next().await {
            match chunk {
                Ok(chunk) => file.write_all(&chunk).await?,
                Err(e) => {
                    drop(file);
                    discard(&path).await;
                    return Err(StorageError::Body(e));
                }
            }
        }
        file.flush().await?;

        tracing::debug!(id, path = %path.display(), "stored object");
        self.objects.push(path);
        Ok(RefId(id))
    }

    fn add_attribute(&mut self, key: &str, value: &str) {
        self.attributes.push(Attribute {
            key: key.to_string(),
            value: value.to_string(),
        });
    }

    fn add_reference(&mut self, key: &str, id: RefId) {
        self.references.push(Reference {
            key: key.to_string(),
            id: id.0,
            path: self.object_path(id.0),
        });
    }
}

async fn discard(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        tracing::debug!(path = %path.display(), error = %e, "cannot remove partial object");
    }
}
