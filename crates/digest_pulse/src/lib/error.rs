#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Transcript unavailable: {0}")]
    TranscriptUnavailable(String),
    #[error("Summary generation failed: {0}")]
    SummaryFailed(String),
    #[error("Summary stream ended before a stop marker was received")]
    StreamEndedWithoutStop,
    #[error("A summary for video {0} is already being generated")]
    AlreadyInFlight(String),
    #[error("Invalid video identifier: {0:?}")]
    InvalidVideoId(String),
}
