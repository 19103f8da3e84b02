//! RPC client with a lazily dialed, cached connection.
//!
//! Connection life cycle:
//!
//! ```text
//!                 dial ok
//!   Disconnected ─────────▶ Connected ──┐ call ok / remote error
//!        ▲                     │  ▲     │
//!        └── transport error ──┘  └─────┘
//! ```
//!
//! There is no background reconnect and no retry inside a call. A failed call
//! returns its error right away and the next call dials again.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::BufReader;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, Span};

use alitas_core::{GatewayConfig, GatewayError, Result};

use super::frame::{read_frame, write_frame, RpcRequest, RpcResponse};

/// An established connection and its request counter.
#[derive(Debug)]
struct Connection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    next_id: u64,
}

impl Connection {
    async fn call(&mut self, method: &str, param: Value, max_message_size: usize) -> Result<Value> {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);

        let request = RpcRequest::new(id, method, param);
        write_frame(&mut self.writer, &request, max_message_size).await?;

        let response: RpcResponse = read_frame(&mut self.reader, max_message_size)
            .await?
            .ok_or_else(|| GatewayError::network("Connection closed by peer"))?;

        if response.id != id {
            return Err(GatewayError::protocol(format!(
                "Response id {} does not match request id {}",
                response.id, id
            )));
        }

        response.into_result()
    }
}

#[derive(Debug)]
enum ConnectionState {
    Disconnected,
    Connected(Connection),
}

/// Client half of the RPC substrate, one per remote endpoint.
///
/// Calls on one client are serialised: a connection carries one call at a
/// time.
#[derive(Debug)]
pub struct RpcClient {
    addr: String,
    dial_timeout: Duration,
    call_timeout: Option<Duration>,
    max_message_size: usize,
    state: Mutex<ConnectionState>,
    dials: AtomicU64,
    span: Span,
}

impl RpcClient {
    pub fn new(addr: impl Into<String>, dial_timeout: Duration, span: Span) -> Self {
        Self {
            addr: addr.into(),
            dial_timeout,
            call_timeout: None,
            max_message_size: GatewayConfig::default().max_message_size,
            state: Mutex::new(ConnectionState::Disconnected),
            dials: AtomicU64::new(0),
            span,
        }
    }

    /// Client for `addr` with the timeouts and limits from `config`.
    pub fn with_config(addr: impl Into<String>, config: &GatewayConfig, span: Span) -> Self {
        let mut client = Self::new(addr, config.dial_timeout, span);
        client.call_timeout = config.call_timeout;
        client.max_message_size = config.max_message_size;
        client
    }

    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = Some(call_timeout);
        self
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Number of successful dials so far.
    pub fn dial_count(&self) -> u64 {
        self.dials.load(Ordering::Relaxed)
    }

    pub async fn is_connected(&self) -> bool {
        matches!(*self.state.lock().await, ConnectionState::Connected(_))
    }

    /// Drops the cached connection, if any.
    pub async fn disconnect(&self) {
        *self.state.lock().await = ConnectionState::Disconnected;
    }

    /// Calls `method` (`Service.Method`) with `arg` and decodes the result.
    ///
    /// Dials first if there is no cached connection. A transport error drops
    /// the connection; an error relayed from the remote side keeps it.
    pub async fn call<A, R>(&self, method: &str, arg: &A) -> Result<R>
    where
        A: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let param = serde_json::to_value(arg)?;
        let mut state = self.state.lock().await;

        // The connection is taken out of the slot for the duration of the
        // call. If this future is dropped midway the slot stays empty and the
        // half-finished exchange can never be mistaken for the next reply.
        let mut connection = match std::mem::replace(&mut *state, ConnectionState::Disconnected) {
            ConnectionState::Connected(connection) => connection,
            ConnectionState::Disconnected => self.dial().await?,
        };

        let outcome = self.call_on(&mut connection, method, param).await.and_then(|value| {
            serde_json::from_value(value).map_err(|e| {
                GatewayError::protocol(format!("Failed to decode result of {}: {}", method, e))
            })
        });

        match &outcome {
            Err(e) if e.is_transport() => {
                debug!(
                    parent: &self.span,
                    addr = %self.addr,
                    method,
                    error = %e,
                    "Dropping connection after transport error"
                );
            }
            _ => *state = ConnectionState::Connected(connection),
        }

        outcome
    }

    async fn call_on(&self, connection: &mut Connection, method: &str, param: Value) -> Result<Value> {
        match self.call_timeout {
            Some(limit) => timeout(limit, connection.call(method, param, self.max_message_size))
                .await
                .map_err(|_| GatewayError::timeout(format!("{} to {}", method, self.addr)))?,
            None => connection.call(method, param, self.max_message_size).await,
        }
    }

    async fn dial(&self) -> Result<Connection> {
        let stream = timeout(self.dial_timeout, TcpStream::connect(self.addr.as_str()))
            .await
            .map_err(|_| GatewayError::timeout(format!("dial {}", self.addr)))?
            .map_err(|e| GatewayError::network(format!("Failed to connect to {}: {}", self.addr, e)))?;
        stream.set_nodelay(true)?;

        self.dials.fetch_add(1, Ordering::Relaxed);
        debug!(parent: &self.span, addr = %self.addr, "Connected to {}", self.addr);

        let (read_half, write_half) = stream.into_split();
        Ok(Connection {
            reader: BufReader::new(read_half),
            writer: write_half,
            next_id: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Answers each request line with a canned response line, then closes.
    async fn scripted_peer(responses: Vec<&'static str>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (read_half, mut write_half) = stream.into_split();
            let mut lines = BufReader::new(read_half).lines();
            for response in responses {
                if lines.next_line().await.unwrap().is_none() {
                    return;
                }
                write_half.write_all(response.as_bytes()).await.unwrap();
                write_half.write_all(b"\n").await.unwrap();
            }
        });
        addr
    }

    #[tokio::test]
    async fn test_dial_failure_leaves_client_disconnected() {
        // Bind then drop to get a port nobody listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let client = RpcClient::new(addr, Duration::from_millis(500), Span::none());
        let result: Result<bool> = client.call("Alitas.SubmitTx", &[1u8]).await;

        assert!(result.unwrap_err().is_transport());
        assert!(!client.is_connected().await);
        assert_eq!(client.dial_count(), 0);
    }

    #[tokio::test]
    async fn test_remote_error_keeps_connection() {
        let addr = scripted_peer(vec![
            r#"{"id":0,"result":null,"error":"Handler error: no snapshot"}"#,
            r#"{"id":1,"result":[1,2],"error":null}"#,
        ])
        .await;
        let client = RpcClient::new(addr, Duration::from_secs(1), Span::none());

        let err = client
            .call::<_, Vec<u8>>("State.GetSnapshot", &3u64)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Handler error: no snapshot");
        assert!(client.is_connected().await);

        let snapshot: Vec<u8> = client.call("State.GetSnapshot", &4u64).await.unwrap();
        assert_eq!(snapshot, vec![1, 2]);
        assert_eq!(client.dial_count(), 1);
    }

    #[tokio::test]
    async fn test_mismatched_id_drops_connection() {
        let addr = scripted_peer(vec![r#"{"id":42,"result":true,"error":null}"#]).await;
        let client = RpcClient::new(addr, Duration::from_secs(1), Span::none());

        let err = client.call::<_, bool>("Alitas.SubmitTx", &[0u8]).await.unwrap_err();
        assert!(matches!(err, GatewayError::Protocol { .. }));
        assert!(!client.is_connected().await);
    }

    #[tokio::test]
    async fn test_peer_hangup_is_a_transport_error() {
        let addr = scripted_peer(vec![]).await;
        let client = RpcClient::new(addr, Duration::from_secs(1), Span::none());

        let err = client.call::<_, bool>("Alitas.SubmitTx", &[0u8]).await.unwrap_err();
        assert!(err.is_transport());
        assert!(!client.is_connected().await);
    }

    #[tokio::test]
    async fn test_call_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        // Accept but never answer.
        let _peer = tokio::spawn(async move {
            let (_stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let client = RpcClient::new(addr, Duration::from_secs(1), Span::none())
            .with_call_timeout(Duration::from_millis(100));
        let err = client
            .call::<_, bool>("Alitas.SubmitTx", &[0u8])
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::Timeout { .. }));
        assert!(!client.is_connected().await);
    }
}
