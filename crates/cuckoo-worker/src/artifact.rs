//! Local handling of downloaded artifacts: digests and scratch files.

use std::path::Path;

use cuckoo_core::{ArtifactStream, ByteStream, CuckooError};
use futures_util::stream::{self, StreamExt, TryStreamExt};
use md5::{Digest, Md5};
use ring::digest::{Context, SHA1_FOR_LEGACY_USE_ONLY};
use tempfile::NamedTempFile;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Buffer size for streaming file reads (64 KiB).
const BUF_SIZE: usize = 64 * 1024;

/// Lowercase hex MD5 of a buffer
#[must_use]
pub fn md5_hex(data: &[u8]) -> String {
    hex::encode(Md5::digest(data))
}

/// MD5 and SHA-1 computed side by side over a stream of chunks
pub struct ArtifactDigest {
    md5: Md5,
    sha1: Context,
}

/// Finished digests, lowercase hex
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Digests {
    /// MD5 digest
    pub md5: String,
    /// SHA-1 digest
    pub sha1: String,
}

impl ArtifactDigest {
    /// Start empty digests
    #[must_use]
    pub fn new() -> Self {
        Self {
            md5: Md5::new(),
            sha1: Context::new(&SHA1_FOR_LEGACY_USE_ONLY),
        }
    }

    /// Feed the next chunk
    pub fn update(&mut self, chunk: &[u8]) {
        self.md5.update(chunk);
        self.sha1.update(chunk);
    }

    /// Finish both digests
    #[must_use]
    pub fn finish(self) -> Digests {
        Digests {
            md5: hex::encode(self.md5.finalize()),
            sha1: hex::encode(self.sha1.finish().as_ref()),
        }
    }
}

impl Default for ArtifactDigest {
    fn default() -> Self {
        Self::new()
    }
}

/// Artifact copied to a scratch file, removed when dropped
pub struct Spooled {
    /// Scratch file holding the artifact
    pub file: NamedTempFile,
    /// Digests of the copied bytes
    pub digests: Digests,
}

/// Why spooling failed
#[derive(Debug)]
pub enum SpoolError {
    /// Reading the artifact from the sandbox failed
    Body(CuckooError),
    /// The scratch file could not be written
    Io(std::io::Error),
}

/// Copy an artifact into a scratch file, hashing it on the way.
///
/// The scratch file is created in the system temp directory with the given
/// prefix and suffix.
pub async fn spool(
    mut artifact: ArtifactStream,
    prefix: &str,
    suffix: &str,
) -> Result<Spooled, SpoolError> {
    let scratch = tempfile::Builder::new()
        .prefix(prefix)
        .suffix(suffix)
        .tempfile()
        .map_err(SpoolError::Io)?;
    let mut out = tokio::fs::File::from_std(scratch.reopen().map_err(SpoolError::Io)?);

    let mut digest = ArtifactDigest::new();
    while let Some(chunk) = artifact.next_chunk().await {
        let chunk = chunk.map_err(SpoolError::Body)?;
        digest.update(&chunk);
        out.write_all(&chunk).await.map_err(SpoolError::Io)?;
    }
    out.flush().await.map_err(SpoolError::Io)?;

    Ok(Spooled {
        file: scratch,
        digests: digest.finish(),
    })
}

/// Stream a local file in fixed-size chunks
pub async fn file_stream(path: &Path) -> std::io::Result<ByteStream> {
    let file = tokio::fs::File::open(path).await?;
    let chunks = stream::try_unfold(file, |mut file| async move {
        let mut buf = vec![0u8; BUF_SIZE];
        let n = file.read(&mut buf).await?;
        if n == 0 {
            return Ok::<_, std::io::Error>(None);
        }
        buf.truncate(n);
        Ok(Some((buf, file)))
    });
    Ok(chunks.map_err(CuckooError::Io).boxed())
}
