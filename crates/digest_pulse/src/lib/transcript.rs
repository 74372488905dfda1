use itertools::Itertools;

use crate::{
    error::Error,
    types::{Segment, Transcript},
    yt::TranscriptSource,
};

/// Fetches a transcript from a [`TranscriptSource`] and normalizes it.
#[derive(Debug, Clone)]
pub struct TranscriptAcquirer<T> {
    source: T,
}

impl<T> TranscriptAcquirer<T>
where
    T: TranscriptSource + Send + Sync,
{
    pub fn new(source: T) -> Self {
        TranscriptAcquirer { source }
    }

    /// Any source failure, or a transcript with no text at all, is reported as
    /// [`Error::TranscriptUnavailable`].
    #[tracing::instrument(skip(self))]
    pub async fn fetch(&self, video_id: &str) -> Result<Transcript, Error> {
        let segments = self
            .source
            .get_transcript(video_id)
            .await
            .inspect_err(|e| tracing::warn!(error = %e, "Failed to fetch transcript"))
            .map_err(|e| Error::TranscriptUnavailable(e.to_string()))?;

        let text = normalize(&segments);
        if text.is_empty() {
            return Err(Error::TranscriptUnavailable(format!(
                "transcript for {video_id} has no text"
            )));
        }

        tracing::debug!(segments = segments.len(), chars = text.len(), "Fetched transcript");
        Ok(Transcript { segments, text })
    }
}

/// Joins the trimmed, non-empty segment texts with newlines.
pub fn normalize(segments: &[Segment]) -> String {
    segments
        .iter()
        .map(|s| s.text.trim())
        .filter(|t| !t.is_empty())
        .join("\n")
}
