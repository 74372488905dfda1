use std::{future::Future, sync::Arc};

use crate::SavedSummary;

pub mod postgres;

/// Durable storage for completed summaries.
///
/// Implementations must treat `save_summary` as an upsert: a repeated write for
/// the same `video_id` must not fail or create a duplicate.
pub trait DataStore {
    fn find_summary(
        &self,
        video_id: &str,
    ) -> impl Future<Output = anyhow::Result<Option<SavedSummary>>> + Send;

    fn save_summary(
        &self,
        video_id: &str,
        channel_id: Option<&str>,
        summary_md: &str,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;
}

impl<T: DataStore + Send + Sync> DataStore for Arc<T> {
    async fn find_summary(&self, video_id: &str) -> anyhow::Result<Option<SavedSummary>> {
        (**self).find_summary(video_id).await
    }

    async fn save_summary(
        &self,
        video_id: &str,
        channel_id: Option<&str>,
        summary_md: &str,
    ) -> anyhow::Result<()> {
        (**self)
            .save_summary(video_id, channel_id, summary_md)
            .await
    }
}
