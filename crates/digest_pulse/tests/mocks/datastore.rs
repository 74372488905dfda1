use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use digest_datastore::{DataStore, SavedSummary};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveCall {
    pub video_id: String,
    pub channel_id: Option<String>,
    pub summary_md: String,
}

#[derive(Clone, Default)]
pub struct MockDataStore {
    pub existing: Arc<Mutex<HashMap<String, SavedSummary>>>,
    pub saved: Arc<Mutex<Vec<SaveCall>>>,
    pub fail_saves_with: Option<String>,
    /// Number of upcoming lookups that read their result and then stall for
    /// `lookup_delay`
    pub slow_lookups: Arc<AtomicUsize>,
    pub lookup_delay: Duration,
}

impl MockDataStore {
    pub fn with_existing(video_id: &str, summary_md: &str) -> Self {
        let store = Self::default();
        store.existing.lock().unwrap().insert(
            video_id.to_string(),
            SavedSummary::new(video_id, None, summary_md),
        );
        store
    }

    pub fn with_slow_lookups(count: usize, delay: Duration) -> Self {
        Self {
            slow_lookups: Arc::new(AtomicUsize::new(count)),
            lookup_delay: delay,
            ..Default::default()
        }
    }

    pub fn failing_saves(msg: &str) -> Self {
        Self {
            fail_saves_with: Some(msg.to_string()),
            ..Default::default()
        }
    }
}

impl DataStore for MockDataStore {
    async fn find_summary(&self, video_id: &str) -> anyhow::Result<Option<SavedSummary>> {
        let found = self.existing.lock().unwrap().get(video_id).cloned();
        let slow = self
            .slow_lookups
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if slow {
            tokio::time::sleep(self.lookup_delay).await;
        }
        Ok(found)
    }

    async fn save_summary(
        &self,
        video_id: &str,
        channel_id: Option<&str>,
        summary_md: &str,
    ) -> anyhow::Result<()> {
        if let Some(ref msg) = self.fail_saves_with {
            return Err(anyhow::anyhow!("{}", msg));
        }
        self.saved.lock().unwrap().push(SaveCall {
            video_id: video_id.to_string(),
            channel_id: channel_id.map(str::to_string),
            summary_md: summary_md.to_string(),
        });
        self.existing.lock().unwrap().insert(
            video_id.to_string(),
            SavedSummary::new(video_id, channel_id.map(str::to_string), summary_md),
        );
        Ok(())
    }
}
