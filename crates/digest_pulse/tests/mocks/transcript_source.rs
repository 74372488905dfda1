use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

use digest_pulse::{types::Segment, yt::TranscriptSource};

/// Returns segments `["transcript of", " ", <video_id>]`, after failing the
/// first `failures` calls.
#[derive(Clone, Default)]
pub struct MockTranscriptSource {
    pub calls: Arc<Mutex<Vec<String>>>,
    pub failures: Arc<AtomicUsize>,
    pub fail_with: String,
}

impl MockTranscriptSource {
    pub fn failing(times: usize, msg: &str) -> Self {
        Self {
            failures: Arc::new(AtomicUsize::new(times)),
            fail_with: msg.to_string(),
            ..Default::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl TranscriptSource for MockTranscriptSource {
    type Error = anyhow::Error;

    async fn get_transcript(&self, video_id: &str) -> anyhow::Result<Vec<Segment>> {
        self.calls.lock().unwrap().push(video_id.to_string());

        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(anyhow::anyhow!("{}", self.fail_with));
        }

        Ok(vec![
            Segment::new("transcript of"),
            Segment::new(" "),
            Segment::new(video_id),
        ])
    }
}
