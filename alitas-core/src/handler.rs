//! # Gateway Contracts
//!
//! The two capability sets that meet at the application boundary.
//!
//! - [`ProxyHandler`] is implemented by the application. Alitas calls it to
//!   hand over committed blocks and to manage snapshots.
//! - [`AppGateway`] is implemented by each transport. The engine talks to the
//!   application only through it, so it does not matter whether the
//!   application lives in the same process or behind a socket.

use async_trait::async_trait;

use crate::queue::SubmitReceiver;
use crate::{Block, CommitResponse, LifecycleState, Result, Snapshot, StateHash};

/// Callbacks an application implements to follow the ledger.
///
/// Every method may fail. Transports pass a failure back to the engine
/// exactly as the handler reported it.
///
/// A socket transport may invoke the handler from several connections at
/// once, so implementations synchronise their own state.
///
/// # Examples
///
/// ```rust
/// use alitas_core::{Block, CommitResponse, LifecycleState, ProxyHandler, Result};
/// use async_trait::async_trait;
/// use bytes::Bytes;
///
/// struct NoopApp;
///
/// #[async_trait]
/// impl ProxyHandler for NoopApp {
///     async fn commit_handler(&self, _block: Block) -> Result<CommitResponse> {
///         Ok(CommitResponse::default())
///     }
///
///     async fn snapshot_handler(&self, _block_index: u64) -> Result<Bytes> {
///         Ok(Bytes::new())
///     }
///
///     async fn restore_handler(&self, snapshot: Bytes) -> Result<Bytes> {
///         Ok(snapshot)
///     }
///
///     async fn state_change_handler(&self, _state: LifecycleState) -> Result<()> {
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait ProxyHandler: Send + Sync {
    /// Apply a committed block and report the resulting state hash.
    async fn commit_handler(&self, block: Block) -> Result<CommitResponse>;

    /// Produce the snapshot of the state as of `block_index`.
    async fn snapshot_handler(&self, block_index: u64) -> Result<Snapshot>;

    /// Replace the current state with `snapshot` and return the new state hash.
    async fn restore_handler(&self, snapshot: Snapshot) -> Result<StateHash>;

    /// The node entered `state`.
    async fn state_change_handler(&self, state: LifecycleState) -> Result<()>;
}

#[async_trait]
impl<T: ProxyHandler + ?Sized> ProxyHandler for std::sync::Arc<T> {
    async fn commit_handler(&self, block: Block) -> Result<CommitResponse> {
        (**self).commit_handler(block).await
    }

    async fn snapshot_handler(&self, block_index: u64) -> Result<Snapshot> {
        (**self).snapshot_handler(block_index).await
    }

    async fn restore_handler(&self, snapshot: Snapshot) -> Result<StateHash> {
        (**self).restore_handler(snapshot).await
    }

    async fn state_change_handler(&self, state: LifecycleState) -> Result<()> {
        (**self).state_change_handler(state).await
    }
}

/// What the engine sees of the application.
#[async_trait]
pub trait AppGateway: Send + Sync {
    /// Takes the receiving end of the transaction hand-off queue.
    ///
    /// The queue has a single consumer: the first call returns it, later
    /// calls return `None`.
    fn take_submit_rx(&self) -> Option<SubmitReceiver>;

    async fn commit_block(&self, block: Block) -> Result<CommitResponse>;

    async fn get_snapshot(&self, block_index: u64) -> Result<Snapshot>;

    async fn restore(&self, snapshot: Snapshot) -> Result<StateHash>;

    async fn on_state_changed(&self, state: LifecycleState) -> Result<()>;
}
