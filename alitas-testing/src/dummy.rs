//! A minimal application: it keeps no business state, only a running hash
//! of every transaction it was given.

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, Span};

use alitas_core::crypto::{encode_to_string, sha256};
use alitas_core::{
    Block, CommitResponse, GatewayError, LifecycleState, ProxyHandler, Result, Snapshot, StateHash,
    Transaction,
};

#[derive(Debug, Default)]
struct Inner {
    committed_txs: Vec<Transaction>,
    state_hash: Vec<u8>,
    snapshots: HashMap<u64, Vec<u8>>,
    lifecycle: Option<LifecycleState>,
}

/// Dummy application state.
///
/// After each block the state hash becomes
/// `H(prev ‖ H(tx₁))`, then `H(that ‖ H(tx₂))`, and so on, with `H` = SHA-256.
/// The hash reached after a block doubles as that block's snapshot, so
/// restoring a snapshot simply adopts it as the current hash.
#[derive(Debug, Clone)]
pub struct DummyState {
    inner: Arc<Mutex<Inner>>,
    span: Span,
}

impl Default for DummyState {
    fn default() -> Self {
        Self::new()
    }
}

impl DummyState {
    pub fn new() -> Self {
        Self::with_span(Span::none())
    }

    pub fn with_span(span: Span) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            span,
        }
    }

    pub fn committed_transactions(&self) -> Vec<Transaction> {
        self.inner.lock().committed_txs.clone()
    }

    pub fn state_hash(&self) -> Bytes {
        Bytes::from(self.inner.lock().state_hash.clone())
    }

    pub fn lifecycle(&self) -> Option<LifecycleState> {
        self.inner.lock().lifecycle
    }

    fn next_hash(prev: &[u8], tx: &[u8]) -> Vec<u8> {
        let mut joined = prev.to_vec();
        joined.extend_from_slice(&sha256(tx));
        sha256(&joined)
    }
}

#[async_trait]
impl ProxyHandler for DummyState {
    async fn commit_handler(&self, block: Block) -> Result<CommitResponse> {
        let mut inner = self.inner.lock();

        let mut hash = inner.state_hash.clone();
        for tx in block.transactions() {
            hash = Self::next_hash(&hash, tx);
        }

        inner.committed_txs.extend_from_slice(block.transactions());
        inner.snapshots.insert(block.index(), hash.clone());
        inner.state_hash = hash.clone();

        debug!(
            parent: &self.span,
            block = block.index(),
            state_hash = %encode_to_string(&hash),
            "Dummy state committed block"
        );
        Ok(CommitResponse::new(hash))
    }

    async fn snapshot_handler(&self, block_index: u64) -> Result<Snapshot> {
        self.inner
            .lock()
            .snapshots
            .get(&block_index)
            .map(|snapshot| Bytes::from(snapshot.clone()))
            .ok_or_else(|| GatewayError::handler(format!("snapshot {} not found", block_index)))
    }

    async fn restore_handler(&self, snapshot: Snapshot) -> Result<StateHash> {
        let mut inner = self.inner.lock();
        inner.state_hash = snapshot.to_vec();

        info!(
            parent: &self.span,
            state_hash = %encode_to_string(&inner.state_hash),
            "Dummy state restored"
        );
        Ok(snapshot)
    }

    async fn state_change_handler(&self, state: LifecycleState) -> Result<()> {
        self.inner.lock().lifecycle = Some(state);
        info!(parent: &self.span, state = %state, "Node state changed");
        Ok(())
    }
}
