use std::{
    collections::HashSet,
    sync::{Arc, Mutex, PoisonError},
};

use digest_datastore::{DataStore, SavedSummary};
use tokio_util::task::TaskTracker;

/// Idempotency and write-once persistence in front of a [`DataStore`].
///
/// Clones share the same store, in-flight set and background writes, so every
/// coordinator built on the same gate is single-flight per video id.
#[derive(Debug)]
pub struct PersistenceGate<D> {
    store: Arc<D>,
    in_flight: Arc<Mutex<HashSet<String>>>,
    writes: TaskTracker,
}

impl<D> Clone for PersistenceGate<D> {
    fn clone(&self) -> Self {
        PersistenceGate {
            store: Arc::clone(&self.store),
            in_flight: Arc::clone(&self.in_flight),
            writes: self.writes.clone(),
        }
    }
}

/// Exclusive right to generate a summary for one video id.
/// Released on drop.
#[derive(Debug)]
pub struct InFlightClaim {
    video_id: String,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl Drop for InFlightClaim {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.video_id);
    }
}

impl<D> PersistenceGate<D>
where
    D: DataStore + Send + Sync + 'static,
{
    pub fn new(store: D) -> Self {
        PersistenceGate {
            store: Arc::new(store),
            in_flight: Arc::default(),
            writes: TaskTracker::new(),
        }
    }

    /// Looks up an existing summary. A failed lookup is logged and treated as a
    /// miss, since the store upserts and regenerating is safe.
    #[tracing::instrument(skip(self))]
    pub async fn find_existing(&self, video_id: &str) -> Option<SavedSummary> {
        match self.store.find_summary(video_id).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(error = ?e, "Summary lookup failed, treating as missing");
                None
            }
        }
    }

    /// Claims `video_id` for generation. Returns `None` while another claim for
    /// the same id is alive.
    pub fn claim(&self, video_id: &str) -> Option<InFlightClaim> {
        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if !in_flight.insert(video_id.to_string()) {
            tracing::debug!(%video_id, "Summary generation already in flight");
            return None;
        }

        Some(InFlightClaim {
            video_id: video_id.to_string(),
            in_flight: Arc::clone(&self.in_flight),
        })
    }

    /// Best-effort write. Failures are logged and swallowed.
    #[tracing::instrument(skip(self, summary_md))]
    pub async fn save(&self, video_id: &str, channel_id: Option<&str>, summary_md: &str) {
        match self
            .store
            .save_summary(video_id, channel_id, summary_md)
            .await
        {
            Ok(()) => tracing::info!(chars = summary_md.len(), "Saved summary"),
            Err(e) => tracing::error!(error = ?e, "Failed to save summary; keeping it in memory only"),
        }
    }

    /// Runs [`save`](Self::save) in the background, holding `claim` until the
    /// write has finished.
    pub fn save_in_background(
        &self,
        claim: InFlightClaim,
        channel_id: Option<String>,
        summary_md: String,
    ) {
        let gate = self.clone();
        self.writes.spawn(async move {
            gate.save(&claim.video_id, channel_id.as_deref(), &summary_md)
                .await;
            drop(claim);
        });
    }

    /// Waits for every background write started so far.
    pub async fn flush(&self) {
        self.writes.close();
        self.writes.wait().await;
        self.writes.reopen();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct FlakyStore {
        saved: Mutex<Vec<String>>,
        fail: bool,
    }

    impl DataStore for FlakyStore {
        async fn find_summary(&self, video_id: &str) -> anyhow::Result<Option<SavedSummary>> {
            if self.fail {
                anyhow::bail!("connection refused");
            }
            Ok(self
                .saved
                .lock()
                .unwrap()
                .iter()
                .find(|s| s.as_str() == video_id)
                .map(|s| SavedSummary::new(s.clone(), None, "- cached")))
        }

        async fn save_summary(
            &self,
            video_id: &str,
            _channel_id: Option<&str>,
            _summary_md: &str,
        ) -> anyhow::Result<()> {
            if self.fail {
                anyhow::bail!("connection refused");
            }
            self.saved.lock().unwrap().push(video_id.to_string());
            Ok(())
        }
    }

    #[test]
    fn test_claim_is_exclusive_until_dropped() {
        let gate = PersistenceGate::new(FlakyStore::default());

        let claim = gate.claim("dQw4w9WgXcQ").expect("first claim succeeds");
        assert!(gate.claim("dQw4w9WgXcQ").is_none());
        assert!(gate.clone().claim("dQw4w9WgXcQ").is_none());
        assert!(gate.claim("9bZkp7q19f0").is_some());

        drop(claim);
        assert!(gate.claim("dQw4w9WgXcQ").is_some());
    }

    #[tokio::test]
    async fn test_lookup_failure_is_a_miss() {
        let gate = PersistenceGate::new(FlakyStore {
            fail: true,
            ..Default::default()
        });
        assert!(gate.find_existing("dQw4w9WgXcQ").await.is_none());
    }

    #[tokio::test]
    async fn test_background_save_releases_claim() {
        let gate = PersistenceGate::new(FlakyStore::default());
        let claim = gate.claim("dQw4w9WgXcQ").unwrap();

        gate.save_in_background(claim, None, "- point".into());
        gate.flush().await;

        assert!(gate.claim("dQw4w9WgXcQ").is_some());
        assert!(gate.find_existing("dQw4w9WgXcQ").await.is_some());
    }

    #[tokio::test]
    async fn test_failed_save_is_swallowed() {
        let gate = PersistenceGate::new(FlakyStore {
            fail: true,
            ..Default::default()
        });
        let claim = gate.claim("dQw4w9WgXcQ").unwrap();

        gate.save_in_background(claim, None, "- point".into());
        gate.flush().await;

        assert!(gate.claim("dQw4w9WgXcQ").is_some());
    }
}
