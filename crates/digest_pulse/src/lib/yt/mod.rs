pub mod captions;
pub mod video_id;

use std::{fmt::Display, future::Future};

use crate::types::Segment;

/// Supplies raw transcript segments for a video.
///
/// Failures usually mean "not found" or "captions disabled" and are often
/// permanent, so callers keep the retry budget for this stage small.
pub trait TranscriptSource {
    type Error: Display + Send + 'static;

    fn get_transcript(
        &self,
        video_id: &str,
    ) -> impl Future<Output = Result<Vec<Segment>, Self::Error>> + Send;
}
