//! # Error Types
//!
//! Error handling for both sides of the application gateway.

use thiserror::Error;

/// Errors produced by the gateway, its transports and the handlers behind it.
///
/// The variants fall into four families that callers treat differently:
///
/// - **Transport errors** (`Network`, `Io`, `Timeout`, `Protocol`): the
///   connection they happened on can no longer be trusted and is dropped by
///   the client that owns it.
/// - **Negative acknowledgment** (`DeliveryFailed`): the engine answered the
///   call but refused the transaction.
/// - **Application errors** (`Handler`, `Remote`): a handler failed. `Remote`
///   carries the message of a handler running behind an RPC server, unchanged.
/// - **Local errors** (`MessageTooLarge`, `UnknownMethod`, `QueueClosed`,
///   `Config`, `Internal`). `Serialization` also counts as a transport
///   error, see [`GatewayError::is_transport`].
///
/// # Examples
///
/// ```rust
/// use alitas_core::GatewayError;
///
/// let error = GatewayError::network("connection refused");
/// assert!(error.is_transport());
/// assert!(error.is_retryable());
/// ```
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Dial, read or write failure on a gateway connection
    #[error("Network error: {message}")]
    Network { message: String },

    /// Underlying socket I/O failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Dial or call exceeded its configured deadline
    #[error("Timeout occurred: {operation}")]
    Timeout { operation: String },

    /// Peer sent something that is not a valid frame for this call
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    /// JSON encoding or decoding failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The engine acknowledged the submission with `false`
    #[error("Failed to deliver transaction to Alitas")]
    DeliveryFailed,

    /// An outgoing message exceeded the frame size limit and was not sent
    #[error("Message too large: {size} bytes exceeds the limit of {limit}")]
    MessageTooLarge { size: usize, limit: usize },

    /// A local handler reported a failure
    #[error("Handler error: {message}")]
    Handler { message: String },

    /// A handler behind an RPC server reported a failure; the message is relayed as-is
    #[error("{message}")]
    Remote { message: String },

    /// The RPC server has no method registered under this name
    #[error("rpc: can't find method {method}")]
    UnknownMethod { method: String },

    /// The transaction hand-off queue has no consumer left
    #[error("Submission queue closed")]
    QueueClosed,

    /// Invalid gateway configuration
    #[error("Configuration error: {reason}")]
    Config { reason: String },

    /// Unexpected internal error
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Result type used across the gateway crates.
pub type Result<T> = std::result::Result<T, GatewayError>;

impl GatewayError {
    /// Creates a new network error with the given message.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Creates a new timeout error for the named operation.
    pub fn timeout(operation: impl Into<String>) -> Self {
        Self::Timeout {
            operation: operation.into(),
        }
    }

    /// Creates a new protocol error with the given message.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates a new handler error with the given message.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use alitas_core::GatewayError;
    ///
    /// let error = GatewayError::handler("cannot parse snapshot");
    /// assert_eq!(error.to_string(), "Handler error: cannot parse snapshot");
    /// ```
    pub fn handler(message: impl Into<String>) -> Self {
        Self::Handler {
            message: message.into(),
        }
    }

    /// Wraps the error text returned by a remote peer.
    pub fn remote(message: impl Into<String>) -> Self {
        Self::Remote {
            message: message.into(),
        }
    }

    /// Creates a new configuration error.
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    /// Creates a new internal error with the given message.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether the error came from the connection itself rather than from
    /// the peer's answer.
    ///
    /// A client drops its cached connection when a call fails with a
    /// transport error and dials again on the next call. Decoding failures
    /// count as transport errors: once a frame cannot be understood the
    /// stream position is unknown.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Network { .. }
                | Self::Io(_)
                | Self::Timeout { .. }
                | Self::Protocol { .. }
                | Self::Serialization(_)
        )
    }

    /// Whether repeating the same call might succeed.
    ///
    /// The gateway never retries on its own; this is a hint for callers.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network { .. } | Self::Io(_) | Self::Timeout { .. } | Self::DeliveryFailed
        )
    }
}
