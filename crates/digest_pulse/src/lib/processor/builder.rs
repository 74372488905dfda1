use digest_datastore::DataStore;

use crate::{
    gate::PersistenceGate,
    processor::{ProcessingCoordinator, RetryBudgets},
    retry::RetryExecutor,
    yt::TranscriptSource,
    Summarizer,
};

pub struct ProcessingCoordinatorBuilder<G = (), T = (), S = ()> {
    gate: G,
    transcript_source: T,
    summarizer: S,
    retry: RetryBudgets,
}

impl ProcessingCoordinatorBuilder {
    pub fn new() -> Self {
        Self {
            gate: (),
            transcript_source: (),
            summarizer: (),
            retry: RetryBudgets::default(),
        }
    }
}

impl Default for ProcessingCoordinatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl<G, T, S> ProcessingCoordinatorBuilder<G, T, S> {
    /// Uses a fresh [`PersistenceGate`] over `store`.
    pub fn store<D2: DataStore + Send + Sync + 'static>(
        self,
        store: D2,
    ) -> ProcessingCoordinatorBuilder<PersistenceGate<D2>, T, S> {
        self.gate(PersistenceGate::new(store))
    }

    /// Shares an existing gate, making this coordinator single-flight with
    /// every other coordinator built on it.
    pub fn gate<D2: DataStore + Send + Sync + 'static>(
        self,
        gate: PersistenceGate<D2>,
    ) -> ProcessingCoordinatorBuilder<PersistenceGate<D2>, T, S> {
        ProcessingCoordinatorBuilder {
            gate,
            transcript_source: self.transcript_source,
            summarizer: self.summarizer,
            retry: self.retry,
        }
    }

    pub fn transcript_source<T2: TranscriptSource + Send + Sync + 'static>(
        self,
        transcript_source: T2,
    ) -> ProcessingCoordinatorBuilder<G, T2, S> {
        ProcessingCoordinatorBuilder {
            gate: self.gate,
            transcript_source,
            summarizer: self.summarizer,
            retry: self.retry,
        }
    }

    pub fn summarizer<S2: Summarizer + Send + Sync + 'static>(
        self,
        summarizer: S2,
    ) -> ProcessingCoordinatorBuilder<G, T, S2> {
        ProcessingCoordinatorBuilder {
            gate: self.gate,
            transcript_source: self.transcript_source,
            summarizer,
            retry: self.retry,
        }
    }

    pub fn transcript_retry(mut self, retry: RetryExecutor) -> Self {
        self.retry.transcript = retry;
        self
    }

    pub fn summary_retry(mut self, retry: RetryExecutor) -> Self {
        self.retry.summary = retry;
        self
    }
}

impl<D, T, S> ProcessingCoordinatorBuilder<PersistenceGate<D>, T, S>
where
    D: DataStore + Send + Sync + 'static,
    T: TranscriptSource + Send + Sync + 'static,
    S: Summarizer + Send + Sync + 'static,
{
    pub fn build(self) -> ProcessingCoordinator<D, T, S> {
        ProcessingCoordinator::new(
            self.gate,
            self.transcript_source,
            self.summarizer,
            self.retry,
        )
    }
}
