pub mod builder;

use std::sync::{Arc, Mutex, PoisonError};

use digest_datastore::DataStore;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::{
    error::Error,
    gate::PersistenceGate,
    parser::{StreamOutcome, StreamSummaryParser},
    retry::RetryExecutor,
    transcript::TranscriptAcquirer,
    types::{ErrorStep, ProcessingJob, Step},
    yt::{video_id::parse_video_id, TranscriptSource},
    Summarizer,
};

/// Retry budgets for the two network-bound stages.
///
/// Transcript failures are often permanent (captions disabled), so that stage
/// gets the smaller budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudgets {
    pub transcript: RetryExecutor,
    pub summary: RetryExecutor,
}

impl Default for RetryBudgets {
    fn default() -> Self {
        let summary = RetryExecutor::default();
        RetryBudgets {
            transcript: RetryExecutor {
                max_retries: 1,
                ..summary
            },
            summary,
        }
    }
}

/// Drives one [`ProcessingJob`] at a time through
/// `idle -> gathering -> summarizing -> complete | error`.
///
/// The job lives in a watch channel: observers [`subscribe`](Self::subscribe)
/// to it and every mutation is fenced by the job's `generation_token`, so work
/// started for a superseded job can never touch the current one.
pub struct ProcessingCoordinator<D, T, S>
where
    D: DataStore + Send + Sync + 'static,
    T: TranscriptSource + Send + Sync + 'static,
    S: Summarizer + Send + Sync + 'static,
{
    inner: Arc<Pipeline<D, T, S>>,
    active: Mutex<Option<CancellationToken>>,
}

struct Pipeline<D, T, S> {
    gate: PersistenceGate<D>,
    acquirer: TranscriptAcquirer<T>,
    summarizer: S,
    retry: RetryBudgets,
    job: watch::Sender<ProcessingJob>,
}

impl<D, T, S> ProcessingCoordinator<D, T, S>
where
    D: DataStore + Send + Sync + 'static,
    T: TranscriptSource + Send + Sync + 'static,
    S: Summarizer + Send + Sync + 'static,
{
    pub fn new(gate: PersistenceGate<D>, source: T, summarizer: S, retry: RetryBudgets) -> Self {
        let (job, _) = watch::channel(ProcessingJob::default());
        ProcessingCoordinator {
            inner: Arc::new(Pipeline {
                gate,
                acquirer: TranscriptAcquirer::new(source),
                summarizer,
                retry,
                job,
            }),
            active: Mutex::new(None),
        }
    }

    /// Starts processing `video`, a raw id or a YouTube URL, and returns the
    /// generation token of the job now being processed.
    ///
    /// Submitting the id of the current job is a no-op unless that job ended in
    /// error. Any other id supersedes the current job: its in-flight work is
    /// cancelled and a fresh job starts from `idle`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn submit(&self, video: &str, channel_id: Option<String>) -> Result<u64, Error> {
        let video_id = parse_video_id(video)?;
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);

        let (same_video, step, token) = {
            let job = self.inner.job.borrow();
            (job.video_id == video_id, job.step, job.generation_token)
        };

        if same_video && step != Step::Error {
            tracing::debug!(%video_id, ?step, token, "Video already submitted");
            return Ok(token);
        }

        if let Some(previous) = active.take() {
            previous.cancel();
        }

        let token = token + 1;
        self.inner
            .job
            .send_replace(ProcessingJob::new(&video_id, channel_id.clone(), token));
        tracing::info!(%video_id, token, "Submitted video");

        let cancel = CancellationToken::new();
        tokio::spawn(Arc::clone(&self.inner).run(video_id, channel_id, token, cancel.clone()));
        *active = Some(cancel);

        Ok(token)
    }

    /// Ends the current job without starting another, e.g. when the consumer
    /// navigates away.
    pub fn discard(&self) {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = active.take() {
            previous.cancel();
        }
        let token = self.inner.job.borrow().generation_token + 1;
        self.inner.job.send_replace(ProcessingJob::vacant(token));
    }

    pub fn snapshot(&self) -> ProcessingJob {
        self.inner.job.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ProcessingJob> {
        self.inner.job.subscribe()
    }

    /// Resolves once the job with generation `token` reaches `complete` or
    /// `error`, or returns whatever job superseded it.
    pub async fn wait_until_settled(&self, token: u64) -> ProcessingJob {
        let mut rx = self.subscribe();
        let settled = rx
            .wait_for(|job| job.generation_token != token || job.step.is_settled())
            .await
            .map(|job| job.clone());

        // the sender lives in `self`, so the channel cannot close while we wait
        settled.unwrap_or_else(|_| self.snapshot())
    }

    /// Waits for background summary writes to finish.
    pub async fn flush_pending_writes(&self) {
        self.inner.gate.flush().await;
    }
}

impl<D, T, S> Drop for ProcessingCoordinator<D, T, S>
where
    D: DataStore + Send + Sync + 'static,
    T: TranscriptSource + Send + Sync + 'static,
    S: Summarizer + Send + Sync + 'static,
{
    fn drop(&mut self) {
        let active = self.active.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(cancel) = active.take() {
            cancel.cancel();
            tracing::debug!("Cancelled in-flight job on shutdown");
        }
    }
}

impl<D, T, S> Pipeline<D, T, S>
where
    D: DataStore + Send + Sync + 'static,
    T: TranscriptSource + Send + Sync + 'static,
    S: Summarizer + Send + Sync + 'static,
{
    /// Applies `transition` only if `token` still names the current job.
    /// Returns whether the job changed.
    fn apply(&self, token: u64, transition: impl FnOnce(&mut ProcessingJob) -> bool) -> bool {
        self.job.send_if_modified(|job| {
            if job.generation_token != token {
                tracing::trace!(token, current = job.generation_token, "Ignoring stale update");
                return false;
            }
            transition(job)
        })
    }

    fn is_current(&self, token: u64) -> bool {
        self.job.borrow().generation_token == token
    }

    async fn run(
        self: Arc<Self>,
        video_id: String,
        channel_id: Option<String>,
        token: u64,
        cancel: CancellationToken,
    ) {
        // dropping `drive` aborts whatever request or backoff sleep is pending
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!(%video_id, token, "Job superseded, aborted in-flight work");
            }
            _ = self.drive(&video_id, channel_id, token) => {}
        }
    }

    #[tracing::instrument(skip(self, channel_id))]
    async fn drive(&self, video_id: &str, channel_id: Option<String>, token: u64) {
        if self.complete_from_store(video_id, token).await {
            return;
        }

        let claim = self.gate.claim(video_id);
        // another run may have saved this video between the lookup and the claim
        if claim.is_some() && self.complete_from_store(video_id, token).await {
            return;
        }

        if !self.apply(token, ProcessingJob::begin_gathering) {
            return;
        }

        let Some(claim) = claim else {
            let err = Error::AlreadyInFlight(video_id.to_string());
            self.apply(token, |job| job.fail(ErrorStep::Gathering, err.to_string()));
            return;
        };

        let transcript = match self
            .retry
            .transcript
            .run(|| self.acquirer.fetch(video_id))
            .await
        {
            Ok(transcript) => transcript,
            Err(e) => {
                self.apply(token, |job| job.fail(ErrorStep::Gathering, e.to_string()));
                return;
            }
        };

        if !self.apply(token, |job| job.begin_summarizing(transcript.text.as_str())) {
            return;
        }

        let summary = self
            .retry
            .summary
            .run(|| self.summarize_once(&transcript.text, token))
            .await;

        match summary {
            Ok(summary) => {
                if self.apply(token, |job| job.complete(summary.as_str())) {
                    tracing::info!(chars = summary.len(), "Summary complete");
                    self.gate.save_in_background(claim, channel_id, summary);
                }
            }
            Err(e) => {
                self.apply(token, |job| job.fail(ErrorStep::Summarizing, e.to_string()));
            }
        }
    }

    /// Takes the fast path when a summary for `video_id` is already saved.
    async fn complete_from_store(&self, video_id: &str, token: u64) -> bool {
        let Some(saved) = self.gate.find_existing(video_id).await else {
            return false;
        };
        tracing::info!("Summary already saved, skipping generation");
        self.apply(token, |job| job.complete(saved.summary_md));
        true
    }

    /// One full streaming attempt. A failed attempt leaves no partial text
    /// behind while the retry backs off.
    async fn summarize_once(&self, transcript: &str, token: u64) -> Result<String, Error> {
        let result = self.stream_attempt(transcript, token).await;
        if result.is_err() {
            self.apply(token, ProcessingJob::reset_stream);
        }
        result
    }

    async fn stream_attempt(&self, transcript: &str, token: u64) -> Result<String, Error> {
        if !self.is_current(token) {
            return Err(Error::SummaryFailed("job superseded".into()));
        }
        self.apply(token, ProcessingJob::reset_stream);

        let stream = self
            .summarizer
            .stream_summary(transcript)
            .await
            .map_err(|e| Error::SummaryFailed(e.to_string()))?;

        let mut parser = StreamSummaryParser::new();
        let outcome = parser
            .consume(stream, |chunk| {
                self.apply(token, |job| job.push_chunk(chunk));
            })
            .await
            .map_err(|e| Error::SummaryFailed(e.to_string()))?;

        match outcome {
            StreamOutcome::Completed(summary) => Ok(summary),
            StreamOutcome::Ended { .. } => Err(Error::StreamEndedWithoutStop),
        }
    }
}

#[cfg(test)]
mod tests {
    use digest_datastore::SavedSummary;
    use futures::stream;

    use super::*;
    use crate::{types::Segment, ByteStream};

    struct EmptyStore;

    impl DataStore for EmptyStore {
        async fn find_summary(&self, _video_id: &str) -> anyhow::Result<Option<SavedSummary>> {
            Ok(None)
        }

        async fn save_summary(
            &self,
            _video_id: &str,
            _channel_id: Option<&str>,
            _summary_md: &str,
        ) -> anyhow::Result<()> {
            Ok(())
        }
    }

    struct SilentSource;

    impl TranscriptSource for SilentSource {
        type Error = &'static str;

        async fn get_transcript(&self, _video_id: &str) -> Result<Vec<Segment>, Self::Error> {
            Ok(Vec::new())
        }
    }

    struct SilentSummarizer;

    impl Summarizer for SilentSummarizer {
        const SUMMARIZER_MODEL: &'static str = "none";
        type Error = &'static str;

        async fn stream_summary(
            &self,
            _transcript: &str,
        ) -> Result<ByteStream<Self::Error>, Self::Error> {
            Ok(Box::pin(stream::empty()))
        }
    }

    fn coordinator() -> ProcessingCoordinator<EmptyStore, SilentSource, SilentSummarizer> {
        ProcessingCoordinator::new(
            PersistenceGate::new(EmptyStore),
            SilentSource,
            SilentSummarizer,
            RetryBudgets::default(),
        )
    }

    #[test]
    fn test_stale_token_cannot_touch_current_job() {
        let coordinator = coordinator();
        let pipeline = &coordinator.inner;

        pipeline.job.send_replace(ProcessingJob::new("AAAAAAAAAAA", None, 1));
        assert!(pipeline.apply(1, ProcessingJob::begin_gathering));

        let current = ProcessingJob::new("BBBBBBBBBBB", None, 2);
        pipeline.job.send_replace(current.clone());
        let mut rx = coordinator.subscribe();

        assert!(!pipeline.apply(1, ProcessingJob::begin_gathering));
        assert!(!pipeline.apply(1, |job| job.fail(ErrorStep::Gathering, "late failure")));
        assert!(!pipeline.apply(1, |job| job.complete("- late summary")));

        assert_eq!(coordinator.snapshot(), current);
        assert!(!rx.has_changed().unwrap());
        assert!(!pipeline.is_current(1));
    }

    #[test]
    fn test_current_token_applies() {
        let coordinator = coordinator();
        let pipeline = &coordinator.inner;
        pipeline.job.send_replace(ProcessingJob::new("AAAAAAAAAAA", None, 3));

        assert!(pipeline.apply(3, ProcessingJob::begin_gathering));
        assert_eq!(coordinator.snapshot().step, Step::Gathering);
    }
}
