use chrono::{DateTime, Utc};
use serde::Serialize;

/// A completed summary as persisted in the store.
///
/// `channel_id` is metadata only; lookups are keyed by `video_id` alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct SavedSummary {
    pub video_id: String,
    pub channel_id: Option<String>,
    pub summary_md: String,
    pub created_at: DateTime<Utc>,
}

impl SavedSummary {
    pub fn new(
        video_id: impl Into<String>,
        channel_id: Option<String>,
        summary_md: impl Into<String>,
    ) -> Self {
        SavedSummary {
            video_id: video_id.into(),
            channel_id,
            summary_md: summary_md.into(),
            created_at: Utc::now(),
        }
    }
}
