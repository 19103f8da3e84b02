use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use alitas_core::crypto::sha256;
use alitas_core::{
    Block, CommitResponse, GatewayError, LifecycleState, ProxyHandler, Result, Snapshot, StateHash,
};

#[derive(Debug, Default)]
struct Calls {
    commits: Vec<Block>,
    snapshot_requests: Vec<u64>,
    restores: Vec<Snapshot>,
    states: Vec<LifecycleState>,
}

#[derive(Debug, Default)]
struct Shared {
    calls: Mutex<Calls>,
    failure: Mutex<Option<String>>,
    commit_delay: Mutex<Option<Duration>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

/// A [`ProxyHandler`] that records every call and answers with values that
/// tests can predict.
///
/// Clones share the same record, so a test can keep one clone and hand the
/// other to a transport.
#[derive(Debug, Clone, Default)]
pub struct RecordingHandler {
    shared: Arc<Shared>,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later call fail with [`GatewayError::Handler`] carrying `message`.
    pub fn fail_with(&self, message: impl Into<String>) {
        *self.shared.failure.lock() = Some(message.into());
    }

    pub fn stop_failing(&self) {
        *self.shared.failure.lock() = None;
    }

    /// Makes each commit take `delay` before answering.
    pub fn set_commit_delay(&self, delay: Duration) {
        *self.shared.commit_delay.lock() = Some(delay);
    }

    /// What `commit_handler` answers for a block with this index.
    pub fn commit_response_for(&self, index: u64) -> CommitResponse {
        CommitResponse::new(Bytes::from(format!("state-{}", index)))
    }

    /// What `snapshot_handler` answers for this index.
    pub fn snapshot_for(&self, index: u64) -> Snapshot {
        Bytes::from(format!("snapshot-{}", index))
    }

    /// What `restore_handler` answers for this snapshot.
    pub fn state_hash_for(&self, snapshot: &[u8]) -> StateHash {
        Bytes::from(sha256(snapshot))
    }

    pub fn committed_blocks(&self) -> Vec<Block> {
        self.shared.calls.lock().commits.clone()
    }

    pub fn committed_indices(&self) -> Vec<u64> {
        self.shared.calls.lock().commits.iter().map(Block::index).collect()
    }

    pub fn snapshot_requests(&self) -> Vec<u64> {
        self.shared.calls.lock().snapshot_requests.clone()
    }

    pub fn restores(&self) -> Vec<Snapshot> {
        self.shared.calls.lock().restores.clone()
    }

    pub fn states(&self) -> Vec<LifecycleState> {
        self.shared.calls.lock().states.clone()
    }

    /// Highest number of commits that were running at the same time.
    pub fn max_concurrent_commits(&self) -> usize {
        self.shared.max_in_flight.load(Ordering::SeqCst)
    }

    fn check_failure(&self) -> Result<()> {
        match self.shared.failure.lock().as_ref() {
            Some(message) => Err(GatewayError::handler(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ProxyHandler for RecordingHandler {
    async fn commit_handler(&self, block: Block) -> Result<CommitResponse> {
        let running = self.shared.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.shared.max_in_flight.fetch_max(running, Ordering::SeqCst);

        let delay = *self.shared.commit_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let index = block.index();
        self.shared.calls.lock().commits.push(block);
        self.shared.in_flight.fetch_sub(1, Ordering::SeqCst);

        self.check_failure()?;
        Ok(self.commit_response_for(index))
    }

    async fn snapshot_handler(&self, block_index: u64) -> Result<Snapshot> {
        self.shared.calls.lock().snapshot_requests.push(block_index);
        self.check_failure()?;
        Ok(self.snapshot_for(block_index))
    }

    async fn restore_handler(&self, snapshot: Snapshot) -> Result<StateHash> {
        let state_hash = self.state_hash_for(&snapshot);
        self.shared.calls.lock().restores.push(snapshot);
        self.check_failure()?;
        Ok(state_hash)
    }

    async fn state_change_handler(&self, state: LifecycleState) -> Result<()> {
        self.shared.calls.lock().states.push(state);
        self.check_failure()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block;

    #[tokio::test]
    async fn test_records_and_fails_on_demand() {
        let handler = RecordingHandler::new();
        let observer = handler.clone();

        handler.commit_handler(block(1, &["a"])).await.unwrap();
        observer.fail_with("nope");
        let err = handler.snapshot_handler(1).await.unwrap_err();
        assert_eq!(err.to_string(), "Handler error: nope");

        observer.stop_failing();
        handler
            .state_change_handler(LifecycleState::Shutdown)
            .await
            .unwrap();

        assert_eq!(observer.committed_indices(), vec![1]);
        assert_eq!(observer.snapshot_requests(), vec![1]);
        assert_eq!(observer.states(), vec![LifecycleState::Shutdown]);
    }
}
