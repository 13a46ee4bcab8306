//! Scoring of a report while it downloads.
//!
//! The JSON parser is synchronous, so it runs on a blocking thread and reads
//! chunks forwarded over a bounded channel. At most [`CHANNEL_DEPTH`] chunks
//! are held in memory at any time.

use std::io::Read;
use std::sync::Arc;

use cuckoo_core::{ArtifactStream, CuckooError, RatingTable, Result, ScoreSummary, SignatureScorer};
use futures_util::StreamExt;
use tokio::sync::mpsc;

/// Chunks buffered between the download and the parser
const CHANNEL_DEPTH: usize = 8;

/// Score a streamed JSON report.
///
/// Failures reading the body surface as the underlying connectivity error,
/// failures parsing it as [`CuckooError::MalformedReport`].
pub async fn score_stream(report: ArtifactStream, ratings: Arc<RatingTable>) -> Result<ScoreSummary> {
    let (tx, rx) = mpsc::channel(CHANNEL_DEPTH);

    let parser = tokio::task::spawn_blocking(move || {
        let mut reader = ChannelReader::new(rx);
        let mut scorer = SignatureScorer::new(&ratings);
        let parsed = scorer.process(&mut reader);
        if let Some(failure) = reader.failure.take() {
            return Err(failure);
        }
        parsed.map(|()| scorer.summary())
    });

    let mut body = report.into_body();
    while let Some(chunk) = body.next().await {
        let failed = chunk.is_err();
        // The parser hangs up early when the document is malformed.
        if tx.send(chunk).await.is_err() || failed {
            break;
        }
    }
    drop(tx);
    drop(body);

    parser
        .await
        .map_err(|e| CuckooError::MalformedReport(format!("report parser stopped: {e}")))?
}

/// Blocking [`Read`] over chunks received from a channel
struct ChannelReader {
    rx: mpsc::Receiver<Result<Vec<u8>>>,
    chunk: Vec<u8>,
    pos: usize,
    failure: Option<CuckooError>,
}

impl ChannelReader {
    const fn new(rx: mpsc::Receiver<Result<Vec<u8>>>) -> Self {
        Self {
            rx,
            chunk: Vec::new(),
            pos: 0,
            failure: None,
        }
    }
}

impl Read for ChannelReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        while self.pos == self.chunk.len() {
            match self.rx.blocking_recv() {
                Some(Ok(chunk)) => {
                    self.chunk = chunk;
                    self.pos = 0;
                }
                Some(Err(e)) => {
                    let message = e.to_string();
                    self.failure = Some(e);
                    return Err(std::io::Error::other(message));
                }
                None => return Ok(0),
            }
        }
        let n = buf.len().min(self.chunk.len() - self.pos);
        buf[..n].copy_from_slice(&self.chunk[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}
