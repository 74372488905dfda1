use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};

use bytes::Bytes;
use digest_pulse::{ByteStream, Summarizer};
use futures::{stream, StreamExt};

pub fn content_record(content: &str) -> Bytes {
    let record = serde_json::json!({ "choices": [{ "delta": { "content": content } }] });
    Bytes::from(format!("{record}\n"))
}

pub fn stop_record() -> Bytes {
    Bytes::from_static(b"{\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n")
}

/// Sets the shared flag when the stream holding it is dropped.
struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[derive(Clone, Default)]
pub struct MockSummarizer {
    pub fragments: Vec<String>,
    pub calls: Arc<Mutex<Vec<String>>>,
    /// Attempts that emit one fragment and then fault
    pub faulty_attempts: usize,
    pub omit_stop: bool,
    pub reject_with: Option<String>,
    /// Transcripts containing this text get a stream that never finishes
    pub hang_on: Option<String>,
    pub hung_stream_dropped: Arc<AtomicBool>,
}

impl MockSummarizer {
    pub fn new(fragments: &[&str]) -> Self {
        Self {
            fragments: fragments.iter().map(|f| f.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn hung_stream_dropped(&self) -> bool {
        self.hung_stream_dropped.load(Ordering::SeqCst)
    }
}

impl Summarizer for MockSummarizer {
    const SUMMARIZER_MODEL: &'static str = "mock-gpt";
    type Error = anyhow::Error;

    async fn stream_summary(&self, transcript: &str) -> anyhow::Result<ByteStream<anyhow::Error>> {
        let attempt = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(transcript.to_string());
            calls.len()
        };

        if let Some(ref msg) = self.reject_with {
            return Err(anyhow::anyhow!("{}", msg));
        }

        let mut records = self
            .fragments
            .iter()
            .map(|f| Ok(content_record(f)))
            .collect::<Vec<anyhow::Result<Bytes>>>();

        if self
            .hang_on
            .as_deref()
            .is_some_and(|needle| transcript.contains(needle))
        {
            records.truncate(1);
            let flag = DropFlag(Arc::clone(&self.hung_stream_dropped));
            return Ok(stream::iter(records)
                .chain(stream::pending())
                .map(move |item| {
                    let _ = &flag;
                    item
                })
                .boxed());
        }

        if attempt <= self.faulty_attempts {
            records.truncate(1);
            records.push(Err(anyhow::anyhow!("connection reset by peer")));
        } else if !self.omit_stop {
            records.push(Ok(stop_record()));
        }

        Ok(stream::iter(records).boxed())
    }
}
