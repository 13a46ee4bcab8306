use futures_util::stream::{self, BoxStream, StreamExt};

use crate::error::Result;

/// Lazily-read body of a sandbox response
pub type ByteStream = BoxStream<'static, Result<Vec<u8>>>;

/// Streamed artifact: the HTTP status plus the body, read chunk by chunk.
///
/// The stream owns the underlying connection. It is released exactly once,
/// when the body is read to the end or when the value is dropped, whichever
/// comes first.
pub struct ArtifactStream {
    status: u16,
    body: ByteStream,
}

impl ArtifactStream {
    /// Wrap a response body
    #[must_use]
    pub fn new(status: u16, body: ByteStream) -> Self {
        Self { status, body }
    }

    /// Build a stream over bytes already in memory
    #[must_use]
    pub fn from_bytes(status: u16, bytes: impl Into<Vec<u8>>) -> Self {
        let bytes = bytes.into();
        Self::new(status, stream::once(async move { Ok(bytes) }).boxed())
    }

    /// HTTP status the sandbox answered with
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.status
    }

    /// Next chunk of the body, `None` at the end
    pub async fn next_chunk(&mut self) -> Option<Result<Vec<u8>>> {
        self.body.next().await
    }

    /// Give up the status and keep the raw body
    #[must_use]
    pub fn into_body(self) -> ByteStream {
        self.body
    }

    /// Read the remaining body into memory
    pub async fn read_to_end(mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        while let Some(chunk) = self.next_chunk().await {
            out.extend_from_slice(&chunk?);
        }
        Ok(out)
    }
}

impl std::fmt::Debug for ArtifactStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactStream")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}
