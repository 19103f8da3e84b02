//! RPC server: an accept loop with one worker task per connection.

use async_trait::async_trait;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn, Span};

use alitas_core::{GatewayConfig, GatewayError, Result};

use super::frame::{encode_frame, read_frame, write_encoded, RpcRequest, RpcResponse};

/// A method table registered under one service name.
///
/// `call` receives the bare method name (the part after `Service.`) and the
/// JSON argument. An `Err` is sent back to the caller as the response's error
/// text and does not affect the connection.
#[async_trait]
pub trait RpcService: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    async fn call(&self, method: &str, param: Value) -> Result<Value>;
}

/// A bound listener waiting to be served.
pub struct RpcServer<S: RpcService> {
    listener: TcpListener,
    service: Arc<S>,
    max_message_size: usize,
    span: Span,
}

impl<S: RpcService> RpcServer<S> {
    /// Binds `addr`. Port 0 picks a free port; see [`local_addr`](Self::local_addr).
    pub async fn bind(addr: &str, service: S, span: Span) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| GatewayError::network(format!("Failed to bind to {}: {}", addr, e)))?;

        let local_addr = listener
            .local_addr()
            .map_err(|e| GatewayError::network(format!("Failed to get local address: {}", e)))?;
        info!(parent: &span, service = service.name(), "RPC listener bound to {}", local_addr);

        Ok(Self {
            listener,
            service: Arc::new(service),
            max_message_size: GatewayConfig::default().max_message_size,
            span,
        })
    }

    pub fn with_max_message_size(mut self, max_message_size: usize) -> Self {
        self.max_message_size = max_message_size;
        self
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn service(&self) -> &Arc<S> {
        &self.service
    }

    /// Serves on the current task until accepting fails.
    pub async fn serve(self) -> Result<()> {
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        self.run(shutdown_rx, Arc::new(AtomicU64::new(0))).await
    }

    /// Serves on a background task.
    ///
    /// Dropping the returned handle stops the server the same way
    /// [`ServerHandle::shutdown`] does, without waiting for it.
    pub fn spawn(self) -> Result<ServerHandle> {
        let local_addr = self.local_addr()?;
        let accepted = Arc::new(AtomicU64::new(0));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(shutdown_rx, accepted.clone()));

        Ok(ServerHandle {
            local_addr,
            accepted,
            shutdown_tx,
            task,
        })
    }

    async fn run(self, mut shutdown: watch::Receiver<bool>, accepted: Arc<AtomicU64>) -> Result<()> {
        let worker_shutdown = shutdown.clone();
        let mut workers = JoinSet::new();

        let outcome = loop {
            tokio::select! {
                _ = shutdown.changed() => break Ok(()),

                incoming = self.listener.accept() => match incoming {
                    Ok((stream, peer)) => {
                        accepted.fetch_add(1, Ordering::Relaxed);
                        debug!(parent: &self.span, "Accepted connection from {}", peer);

                        let service = self.service.clone();
                        let span = self.span.clone();
                        let max_message_size = self.max_message_size;
                        let mut stop = worker_shutdown.clone();

                        workers.spawn(async move {
                            tokio::select! {
                                served = serve_connection(stream, service, max_message_size, &span) => {
                                    match served {
                                        Ok(()) => debug!(parent: &span, "Connection from {} closed", peer),
                                        Err(e) => warn!(parent: &span, "Connection from {} failed: {}", peer, e),
                                    }
                                }
                                _ = stop.changed() => {}
                            }
                        });
                    }
                    Err(e) => {
                        error!(parent: &self.span, "Failed to accept connection: {}", e);
                        break Err(GatewayError::network(format!("Failed to accept connection: {}", e)));
                    }
                },

                Some(_) = workers.join_next(), if !workers.is_empty() => {}
            }
        };

        // Closes every live connection before reporting back.
        workers.shutdown().await;
        info!(parent: &self.span, service = self.service.name(), "RPC server stopped");
        outcome
    }
}

async fn serve_connection<S: RpcService>(
    stream: TcpStream,
    service: Arc<S>,
    max_message_size: usize,
    span: &Span,
) -> Result<()> {
    stream.set_nodelay(true)?;
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    while let Some(request) = read_frame::<_, RpcRequest>(&mut reader, max_message_size).await? {
        let response = dispatch(service.as_ref(), request, span).await;
        let frame = match encode_frame(&response, max_message_size) {
            Ok(frame) => frame,
            Err(e @ GatewayError::MessageTooLarge { .. }) => {
                warn!(parent: span, id = response.id, error = %e, "Response dropped, replying with error");
                encode_frame(&RpcResponse::err(response.id, e.to_string()), max_message_size)?
            }
            Err(e) => return Err(e),
        };
        write_encoded(&mut write_half, &frame).await?;
    }

    Ok(())
}

async fn dispatch<S: RpcService>(service: &S, mut request: RpcRequest, span: &Span) -> RpcResponse {
    let id = request.id;
    let param = request.take_param();

    let outcome = match request.service_method() {
        Some((name, method)) if name == service.name() => service.call(method, param).await,
        _ => Err(GatewayError::UnknownMethod {
            method: request.method.clone(),
        }),
    };

    match outcome {
        Ok(result) => RpcResponse::ok(id, result),
        Err(e) => {
            debug!(parent: span, method = %request.method, error = %e, "Call returned an error");
            RpcResponse::err(id, e.to_string())
        }
    }
}

/// Control handle for a server started with [`RpcServer::spawn`].
#[derive(Debug)]
pub struct ServerHandle {
    local_addr: SocketAddr,
    accepted: Arc<AtomicU64>,
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<Result<()>>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Connections accepted since the server started.
    pub fn accepted_connections(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    /// Whether the accept loop has ended, by shutdown or by failure.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Asks the server to stop without waiting for it.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Stops accepting, closes live connections and returns how the loop ended.
    pub async fn shutdown(self) -> Result<()> {
        self.stop();
        self.task
            .await
            .map_err(|e| GatewayError::internal(format!("RPC server task failed: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::RpcClient;
    use serde_json::json;
    use std::time::Duration;

    struct Echo;

    #[async_trait]
    impl RpcService for Echo {
        fn name(&self) -> &'static str {
            "Echo"
        }

        async fn call(&self, method: &str, param: Value) -> Result<Value> {
            match method {
                "Say" => Ok(param),
                "Repeat" => {
                    let count: usize = serde_json::from_value(param)?;
                    Ok(Value::String("x".repeat(count)))
                }
                "Fail" => Err(GatewayError::handler("asked to fail")),
                other => Err(GatewayError::UnknownMethod {
                    method: format!("Echo.{}", other),
                }),
            }
        }
    }

    async fn start() -> ServerHandle {
        RpcServer::bind("127.0.0.1:0", Echo, Span::none())
            .await
            .unwrap()
            .spawn()
            .unwrap()
    }

    async fn start_with_limit(max_message_size: usize) -> ServerHandle {
        RpcServer::bind("127.0.0.1:0", Echo, Span::none())
            .await
            .unwrap()
            .with_max_message_size(max_message_size)
            .spawn()
            .unwrap()
    }

    fn client_for(handle: &ServerHandle) -> RpcClient {
        RpcClient::new(handle.local_addr().to_string(), Duration::from_secs(1), Span::none())
    }

    #[tokio::test]
    async fn test_round_trip_and_errors() {
        let handle = start().await;
        let client = client_for(&handle);

        let said: String = client.call("Echo.Say", "hello").await.unwrap();
        assert_eq!(said, "hello");

        let err = client.call::<_, Value>("Echo.Fail", &json!(null)).await.unwrap_err();
        assert_eq!(err.to_string(), "Handler error: asked to fail");

        let err = client.call::<_, Value>("Other.Say", "x").await.unwrap_err();
        assert_eq!(err.to_string(), "rpc: can't find method Other.Say");

        // All of the above went over one connection.
        let again: u64 = client.call("Echo.Say", &7u64).await.unwrap();
        assert_eq!(again, 7);
        assert_eq!(handle.accepted_connections(), 1);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_connections_are_served_concurrently() {
        let handle = start().await;
        let first = client_for(&handle);
        let second = client_for(&handle);

        let (a, b) = tokio::join!(
            first.call::<_, u64>("Echo.Say", &1u64),
            second.call::<_, u64>("Echo.Say", &2u64),
        );
        assert_eq!((a.unwrap(), b.unwrap()), (1, 2));
        assert_eq!(handle.accepted_connections(), 2);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_closes_live_connections() {
        let handle = start().await;
        let client = client_for(&handle);
        let _: String = client.call("Echo.Say", "before").await.unwrap();

        handle.shutdown().await.unwrap();

        let err = client.call::<_, String>("Echo.Say", "after").await.unwrap_err();
        assert!(err.is_transport());
        assert!(!client.is_connected().await);
    }

    #[tokio::test]
    async fn test_oversized_response_becomes_error_reply() {
        let handle = start_with_limit(256).await;
        let client = client_for(&handle);

        let err = client
            .call::<_, String>("Echo.Repeat", &1000usize)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Remote { .. }));
        assert!(err.to_string().starts_with("Message too large"));
        assert!(client.is_connected().await);

        let small: String = client.call("Echo.Say", "ok").await.unwrap();
        assert_eq!(small, "ok");
        assert_eq!(handle.accepted_connections(), 1);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_oversized_request_keeps_connection() {
        let handle = start().await;
        let config = GatewayConfig::default().with_max_message_size(256);
        let client = RpcClient::with_config(handle.local_addr().to_string(), &config, Span::none());

        let _: String = client.call("Echo.Say", "warm up").await.unwrap();

        let err = client
            .call::<_, String>("Echo.Say", &"y".repeat(1000))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::MessageTooLarge { limit: 256, .. }));
        assert!(client.is_connected().await);

        let again: String = client.call("Echo.Say", "still here").await.unwrap();
        assert_eq!(again, "still here");
        assert_eq!(client.dial_count(), 1);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_stopped_server_reports_clean_exit() {
        let handle = start().await;
        handle.stop();

        tokio::time::timeout(Duration::from_secs(2), async {
            while !handle.is_finished() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        handle.shutdown().await.unwrap();
    }
}
