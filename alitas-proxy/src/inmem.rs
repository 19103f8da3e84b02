//! In-process gateway: Alitas and the application share a process and talk
//! through plain method calls.

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, enabled, Level, Span};

use alitas_core::{
    submit_queue, AppGateway, Block, CommitResponse, LifecycleState, ProxyHandler, Result,
    Snapshot, StateHash, SubmitReceiver, SubmitSender,
};

/// [`AppGateway`] that calls a [`ProxyHandler`] directly.
///
/// Nothing is serialised. Delivery calls run on the caller's task and return
/// whatever the handler returned.
/// Transactions submitted by the application are copied into the hand-off
/// queue that the engine drains.
///
/// # Examples
///
/// ```rust,no_run
/// use alitas_proxy::InmemProxy;
/// use alitas_core::AppGateway;
/// use alitas_testing::DummyState;
/// use tracing::Span;
///
/// # async fn run() -> alitas_core::Result<()> {
/// let proxy = InmemProxy::new(DummyState::new(), None, Span::current());
/// let mut submitted = proxy.take_submit_rx().expect("fresh proxy");
///
/// proxy.submit_tx(b"hello").await?;
/// assert_eq!(submitted.recv().await.unwrap().as_ref(), b"hello");
/// # Ok(())
/// # }
/// ```
pub struct InmemProxy<H> {
    handler: H,
    submit_tx: SubmitSender,
    submit_rx: Mutex<Option<SubmitReceiver>>,
    span: Span,
}

impl<H: ProxyHandler> InmemProxy<H> {
    /// `queue_capacity` bounds the hand-off queue; `None` leaves it unbounded.
    /// Pass `Span::none()` to silence logging.
    ///
    /// # Panics
    ///
    /// Panics if `queue_capacity` is `Some(0)`, like [`submit_queue`].
    pub fn new(handler: H, queue_capacity: Option<usize>, span: Span) -> Self {
        let (submit_tx, submit_rx) = submit_queue(queue_capacity);
        Self {
            handler,
            submit_tx,
            submit_rx: Mutex::new(Some(submit_rx)),
            span,
        }
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Called by the application. Copies `tx` into the hand-off queue, waiting
    /// for room if the queue is bounded and full.
    pub async fn submit_tx(&self, tx: &[u8]) -> Result<()> {
        self.submit_tx.submit(tx).await
    }

    /// A producer handle for application code that cannot borrow the proxy.
    pub fn submitter(&self) -> SubmitSender {
        self.submit_tx.clone()
    }
}

#[async_trait]
impl<H: ProxyHandler> AppGateway for InmemProxy<H> {
    fn take_submit_rx(&self) -> Option<SubmitReceiver> {
        self.submit_rx.lock().take()
    }

    async fn commit_block(&self, block: Block) -> Result<CommitResponse> {
        let index = block.index();
        let txs = block.transactions().len();
        // Only pay for the JSON dump when someone is listening at debug level
        let dump = if enabled!(Level::DEBUG) {
            block
                .marshal()
                .ok()
                .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        } else {
            None
        };

        let result = self.handler.commit_handler(block).await;

        debug!(
            parent: &self.span,
            block = index,
            txs,
            block_json = dump.as_deref().unwrap_or_default(),
            response = ?result.as_ref().ok(),
            err = ?result.as_ref().err(),
            "InmemProxy.CommitBlock"
        );
        result
    }

    async fn get_snapshot(&self, block_index: u64) -> Result<Snapshot> {
        let result = self.handler.snapshot_handler(block_index).await;

        debug!(
            parent: &self.span,
            block = block_index,
            snapshot_len = ?result.as_ref().map(|s| s.len()).ok(),
            err = ?result.as_ref().err(),
            "InmemProxy.GetSnapshot"
        );
        result
    }

    async fn restore(&self, snapshot: Snapshot) -> Result<StateHash> {
        let result = self.handler.restore_handler(snapshot).await;

        debug!(
            parent: &self.span,
            state_hash = ?result.as_ref().ok(),
            err = ?result.as_ref().err(),
            "InmemProxy.Restore"
        );
        result
    }

    async fn on_state_changed(&self, state: LifecycleState) -> Result<()> {
        let result = self.handler.state_change_handler(state).await;

        debug!(
            parent: &self.span,
            state = %state,
            err = ?result.as_ref().err(),
            "InmemProxy.OnStateChanged"
        );
        result
    }
}
