use serde::{Deserialize, Serialize};

/// One timed unit of transcript text.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub text: String,
    pub offset_ms: Option<u64>,
    pub duration_ms: Option<u64>,
}

impl Segment {
    pub fn new(text: impl Into<String>) -> Self {
        Segment {
            text: text.into(),
            ..Default::default()
        }
    }
}

/// A fetched transcript along with its normalized text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    pub segments: Vec<Segment>,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Step {
    #[default]
    Idle,
    Gathering,
    Summarizing,
    Complete,
    Error,
}

impl Step {
    pub fn is_settled(&self) -> bool {
        matches!(self, Step::Complete | Step::Error)
    }
}

/// The stage that produced a job's error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorStep {
    Gathering,
    Summarizing,
}

/// The unit of work for one video id, as observed by consumers.
///
/// Transitions are only valid along the edges
/// `idle -> gathering -> summarizing -> complete`, the fast path
/// `idle -> complete`, and `gathering | summarizing -> error`.
/// Every transition method returns `false` and leaves the job untouched when
/// called from a state that does not allow it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingJob {
    pub video_id: String,
    pub channel_id: Option<String>,
    pub step: Step,
    pub error_step: Option<ErrorStep>,
    pub transcript_text: String,
    pub final_summary: Option<String>,
    pub streaming_buffer: String,
    pub error_message: Option<String>,
    pub generation_token: u64,
    #[serde(skip)]
    summary_started: bool,
}

impl ProcessingJob {
    pub fn new(
        video_id: impl Into<String>,
        channel_id: Option<String>,
        generation_token: u64,
    ) -> Self {
        ProcessingJob {
            video_id: video_id.into(),
            channel_id,
            generation_token,
            ..Default::default()
        }
    }

    /// An empty job carrying only a token, installed when the consumer goes away.
    pub fn vacant(generation_token: u64) -> Self {
        ProcessingJob {
            generation_token,
            ..Default::default()
        }
    }

    /// The best text available right now: the final summary if set, otherwise
    /// whatever has streamed in so far.
    pub fn current_text(&self) -> &str {
        self.final_summary
            .as_deref()
            .unwrap_or(&self.streaming_buffer)
    }

    pub fn begin_gathering(&mut self) -> bool {
        if self.step != Step::Idle {
            tracing::warn!(video_id = %self.video_id, step = ?self.step, "Invalid transition to gathering");
            return false;
        }
        self.step = Step::Gathering;
        true
    }

    /// Moves to `summarizing`. Returns `false` if generation was already started
    /// for this job, so only one summary request is ever issued per job.
    pub fn begin_summarizing(&mut self, transcript_text: impl Into<String>) -> bool {
        if self.step != Step::Gathering || self.summary_started {
            tracing::warn!(
                video_id = %self.video_id,
                step = ?self.step,
                summary_started = self.summary_started,
                "Invalid transition to summarizing"
            );
            return false;
        }
        self.summary_started = true;
        self.transcript_text = transcript_text.into();
        self.step = Step::Summarizing;
        true
    }

    pub fn push_chunk(&mut self, chunk: &str) -> bool {
        if self.step != Step::Summarizing {
            return false;
        }
        self.streaming_buffer.push_str(chunk);
        true
    }

    /// Drops partial text left by a failed stream attempt.
    pub fn reset_stream(&mut self) -> bool {
        if self.step != Step::Summarizing || self.streaming_buffer.is_empty() {
            return false;
        }
        self.streaming_buffer.clear();
        true
    }

    pub fn complete(&mut self, summary: impl Into<String>) -> bool {
        if !matches!(self.step, Step::Idle | Step::Summarizing) {
            tracing::warn!(video_id = %self.video_id, step = ?self.step, "Invalid transition to complete");
            return false;
        }
        self.final_summary = Some(summary.into());
        self.streaming_buffer.clear();
        self.step = Step::Complete;
        true
    }

    pub fn fail(&mut self, error_step: ErrorStep, message: impl Into<String>) -> bool {
        let expected = match error_step {
            ErrorStep::Gathering => Step::Gathering,
            ErrorStep::Summarizing => Step::Summarizing,
        };
        if self.step != expected {
            tracing::warn!(video_id = %self.video_id, step = ?self.step, ?error_step, "Invalid transition to error");
            return false;
        }
        self.step = Step::Error;
        self.error_step = Some(error_step);
        self.error_message = Some(message.into());
        true
    }
}
