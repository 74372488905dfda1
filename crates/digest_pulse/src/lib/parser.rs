//! # Summary Stream Parser
//!
//! Incremental parser for the newline-delimited JSON stream emitted by the
//! summary service. Each record may carry an incremental content fragment at
//! `choices[0].delta.content` and/or a termination marker at
//! `choices[0].finish_reason == "stop"`.

use std::fmt::Display;

use futures::{Stream, StreamExt};
use serde::Deserialize;

const SSE_DATA_PREFIX: &str = "data:";
const SSE_DONE_SENTINEL: &str = "[DONE]";
const STOP_REASON: &str = "stop";

/// How a consumed stream finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    /// A stop record was seen; holds the full accumulated text.
    Completed(String),
    /// The source ran dry without a stop record.
    Ended { partial: String },
}

#[derive(Debug, Deserialize)]
struct ChunkRecord {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    delta: Option<ChunkDelta>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChunkDelta {
    content: Option<String>,
}

#[derive(Debug, Default)]
pub struct StreamSummaryParser {
    pending: Vec<u8>,
    accumulated: String,
    fragments: usize,
}

impl StreamSummaryParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Text accumulated so far.
    pub fn accumulated(&self) -> &str {
        &self.accumulated
    }

    /// Reads `stream` until a stop record, a read error or end of data.
    ///
    /// `on_chunk` is called once per content fragment, in stream order. Reading
    /// stops as soon as the stop record is seen; the rest of the stream is not
    /// drained.
    #[tracing::instrument(skip_all)]
    pub async fn consume<S, B, E>(
        &mut self,
        mut stream: S,
        mut on_chunk: impl FnMut(&str),
    ) -> Result<StreamOutcome, E>
    where
        S: Stream<Item = Result<B, E>> + Unpin,
        B: AsRef<[u8]>,
        E: Display,
    {
        while let Some(read) = stream.next().await {
            let bytes = read.inspect_err(
                |e| tracing::error!(error = %e, fragments = self.fragments, "Summary stream faulted"),
            )?;

            if let Some(full_text) = self.feed(bytes.as_ref(), &mut on_chunk) {
                return Ok(StreamOutcome::Completed(full_text));
            }
        }

        if let Some(full_text) = self.finish(&mut on_chunk) {
            return Ok(StreamOutcome::Completed(full_text));
        }

        tracing::warn!(
            fragments = self.fragments,
            chars = self.accumulated.len(),
            "Summary stream ended without a stop marker"
        );
        Ok(StreamOutcome::Ended {
            partial: std::mem::take(&mut self.accumulated),
        })
    }

    /// Buffers `bytes` and processes every complete line.
    /// Returns the full text once a stop record is seen.
    pub fn feed(&mut self, bytes: &[u8], on_chunk: &mut impl FnMut(&str)) -> Option<String> {
        self.pending.extend_from_slice(bytes);

        // '\n' never occurs inside a multi-byte UTF-8 sequence, so splitting the
        // raw bytes keeps characters that straddle two reads intact
        let mut start = 0;
        let mut completed = None;
        while let Some(pos) = self.pending[start..].iter().position(|b| *b == b'\n') {
            let end = start + pos;
            let line = String::from_utf8_lossy(&self.pending[start..end]).into_owned();
            start = end + 1;

            if self.process_line(&line, on_chunk) {
                completed = Some(std::mem::take(&mut self.accumulated));
                break;
            }
        }
        self.pending.drain(..start);

        completed
    }

    /// Processes a trailing line that was never newline-terminated.
    pub fn finish(&mut self, on_chunk: &mut impl FnMut(&str)) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let line = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();

        self.process_line(&line, on_chunk)
            .then(|| std::mem::take(&mut self.accumulated))
    }

    /// Returns `true` when the line carries the stop marker.
    fn process_line(&mut self, line: &str, on_chunk: &mut impl FnMut(&str)) -> bool {
        let mut line = line.trim();
        if let Some(rest) = line.strip_prefix(SSE_DATA_PREFIX) {
            line = rest.trim_start();
        }
        if line.is_empty() || line == SSE_DONE_SENTINEL {
            return false;
        }

        let record = match serde_json::from_str::<ChunkRecord>(line) {
            Ok(record) => record,
            Err(e) => {
                tracing::debug!(error = %e, %line, "Dropping malformed stream line");
                return false;
            }
        };

        let Some(choice) = record.choices.into_iter().next() else {
            return false;
        };

        if let Some(content) = choice.delta.and_then(|d| d.content) {
            if !content.is_empty() {
                self.accumulated.push_str(&content);
                self.fragments += 1;
                on_chunk(&content);
            }
        }

        choice.finish_reason.as_deref() == Some(STOP_REASON)
    }
}
