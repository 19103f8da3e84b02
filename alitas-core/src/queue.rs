//! Transaction hand-off queue between the application and the engine.

use tokio::sync::mpsc;

use crate::{GatewayError, Result, Transaction};

/// Creates a FIFO hand-off queue.
///
/// `Some(n)` gives a bounded queue of `n` transactions whose `submit` waits
/// while the queue is full. `None` gives an unbounded queue.
///
/// # Panics
///
/// Panics if `capacity` is `Some(0)`; [`GatewayConfig::validate`] rejects
/// that value before it gets here.
///
/// [`GatewayConfig::validate`]: crate::GatewayConfig::validate
///
/// # Examples
///
/// ```rust
/// use alitas_core::submit_queue;
///
/// # tokio_test::block_on(async {
/// let (sender, mut receiver) = submit_queue(Some(16));
/// sender.submit(b"tx1").await.unwrap();
/// assert_eq!(receiver.recv().await.unwrap().as_ref(), b"tx1");
/// # });
/// ```
pub fn submit_queue(capacity: Option<usize>) -> (SubmitSender, SubmitReceiver) {
    match capacity {
        Some(capacity) => {
            let (tx, rx) = mpsc::channel(capacity);
            (
                SubmitSender {
                    inner: SenderKind::Bounded(tx),
                },
                SubmitReceiver {
                    inner: ReceiverKind::Bounded(rx),
                },
            )
        }
        None => {
            let (tx, rx) = mpsc::unbounded_channel();
            (
                SubmitSender {
                    inner: SenderKind::Unbounded(tx),
                },
                SubmitReceiver {
                    inner: ReceiverKind::Unbounded(rx),
                },
            )
        }
    }
}

#[derive(Debug, Clone)]
enum SenderKind {
    Bounded(mpsc::Sender<Transaction>),
    Unbounded(mpsc::UnboundedSender<Transaction>),
}

#[derive(Debug)]
enum ReceiverKind {
    Bounded(mpsc::Receiver<Transaction>),
    Unbounded(mpsc::UnboundedReceiver<Transaction>),
}

/// Producer side of the hand-off queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct SubmitSender {
    inner: SenderKind,
}

impl SubmitSender {
    /// Copies `tx` and enqueues the copy.
    ///
    /// The queue never aliases the caller's buffer: once this returns, the
    /// caller may reuse or overwrite `tx` without affecting what the engine
    /// reads.
    ///
    /// Waits for room on a bounded queue. Fails with
    /// [`GatewayError::QueueClosed`] when the receiver is gone.
    pub async fn submit(&self, tx: &[u8]) -> Result<()> {
        let owned = Transaction::copy_from_slice(tx);
        match &self.inner {
            SenderKind::Bounded(sender) => sender
                .send(owned)
                .await
                .map_err(|_| GatewayError::QueueClosed),
            SenderKind::Unbounded(sender) => {
                sender.send(owned).map_err(|_| GatewayError::QueueClosed)
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        match &self.inner {
            SenderKind::Bounded(sender) => sender.is_closed(),
            SenderKind::Unbounded(sender) => sender.is_closed(),
        }
    }
}

/// Consumer side of the hand-off queue, drained by the engine.
#[derive(Debug)]
pub struct SubmitReceiver {
    inner: ReceiverKind,
}

impl SubmitReceiver {
    /// Next transaction in submission order, or `None` once every sender is
    /// dropped and the queue is empty.
    pub async fn recv(&mut self) -> Option<Transaction> {
        match &mut self.inner {
            ReceiverKind::Bounded(rx) => rx.recv().await,
            ReceiverKind::Unbounded(rx) => rx.recv().await,
        }
    }

    /// Non-blocking variant of [`recv`](Self::recv).
    pub fn try_recv(&mut self) -> Option<Transaction> {
        match &mut self.inner {
            ReceiverKind::Bounded(rx) => rx.try_recv().ok(),
            ReceiverKind::Unbounded(rx) => rx.try_recv().ok(),
        }
    }
}
