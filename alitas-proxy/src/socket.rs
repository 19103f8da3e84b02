//! Socket gateways: the two ends of a TCP deployment, where the engine and
//! the application run as separate processes.
//!
//! ```text
//!   engine                                   application
//!   SocketGateway                            SocketAppProxy
//!     SubmitService  <── Alitas.SubmitTx ──    SubmitClient
//!     DeliveryClient ──  State.*         ──>   StateService(handler)
//! ```

use async_trait::async_trait;
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, Span};

use alitas_core::{
    submit_queue, AppGateway, Block, CommitResponse, GatewayConfig, LifecycleState, ProxyHandler,
    Result, Snapshot, StateHash, SubmitReceiver,
};

use crate::delivery::{DeliveryClient, StateService};
use crate::rpc::ServerHandle;
use crate::submission::{SubmitClient, SubmitService};

/// Engine-side [`AppGateway`] speaking to an application over TCP.
///
/// Listens on `proxy_listen` for submitted transactions and calls the
/// application at `client_connect` for everything else. The application
/// does not need to be up when the gateway starts; the first delivery call
/// dials it.
#[derive(Debug)]
pub struct SocketGateway {
    submission: ServerHandle,
    delivery: DeliveryClient,
    submit_rx: Mutex<Option<SubmitReceiver>>,
    span: Span,
}

impl SocketGateway {
    pub async fn bind(config: &GatewayConfig, span: Span) -> Result<Self> {
        config.validate()?;

        let (sender, receiver) = submit_queue(config.submit_queue_capacity);
        let submission = SubmitService::new(sender, span.clone())
            .bind(&config.proxy_listen)
            .await?
            .with_max_message_size(config.max_message_size)
            .spawn()?;

        info!(
            parent: &span,
            proxy_listen = %submission.local_addr(),
            client_connect = %config.client_connect,
            "Socket gateway started"
        );

        Ok(Self {
            submission,
            delivery: DeliveryClient::from_config(config, span.clone()),
            submit_rx: Mutex::new(Some(receiver)),
            span,
        })
    }

    /// Address of the submission listener.
    pub fn local_addr(&self) -> SocketAddr {
        self.submission.local_addr()
    }

    pub fn submission_server(&self) -> &ServerHandle {
        &self.submission
    }

    pub fn delivery(&self) -> &DeliveryClient {
        &self.delivery
    }

    /// Stops the submission listener. Transactions already queued stay
    /// available to whoever holds the receiver.
    pub async fn shutdown(self) -> Result<()> {
        let Self {
            submission,
            delivery,
            span,
            ..
        } = self;
        delivery.rpc().disconnect().await;
        let result = submission.shutdown().await;
        info!(parent: &span, "Socket gateway stopped");
        result
    }
}

#[async_trait]
impl AppGateway for SocketGateway {
    fn take_submit_rx(&self) -> Option<SubmitReceiver> {
        self.submit_rx.lock().take()
    }

    async fn commit_block(&self, block: Block) -> Result<CommitResponse> {
        self.delivery.commit_block(&block).await
    }

    async fn get_snapshot(&self, block_index: u64) -> Result<Snapshot> {
        self.delivery.get_snapshot(block_index).await
    }

    async fn restore(&self, snapshot: Snapshot) -> Result<StateHash> {
        self.delivery.restore(&snapshot).await
    }

    async fn on_state_changed(&self, state: LifecycleState) -> Result<()> {
        self.delivery.on_state_changed(state).await
    }
}

/// Application-side proxy: serves the engine's delivery calls from a local
/// [`ProxyHandler`] and forwards transactions to the engine.
#[derive(Debug)]
pub struct SocketAppProxy<H> {
    service: Arc<StateService<H>>,
    delivery: ServerHandle,
    submit: SubmitClient,
    span: Span,
}

impl<H: ProxyHandler + 'static> SocketAppProxy<H> {
    pub async fn bind(handler: H, config: &GatewayConfig, span: Span) -> Result<Self> {
        config.validate()?;

        let server = StateService::new(handler, span.clone())
            .bind(&config.client_connect)
            .await?
            .with_max_message_size(config.max_message_size);
        let service = server.service().clone();
        let delivery = server.spawn()?;

        info!(
            parent: &span,
            client_connect = %delivery.local_addr(),
            proxy_listen = %config.proxy_listen,
            "Socket app proxy started"
        );

        Ok(Self {
            service,
            delivery,
            submit: SubmitClient::from_config(config, span.clone()),
            span,
        })
    }

    /// Address of the delivery listener.
    pub fn local_addr(&self) -> SocketAddr {
        self.delivery.local_addr()
    }

    pub fn handler(&self) -> &H {
        self.service.handler()
    }

    pub fn delivery_server(&self) -> &ServerHandle {
        &self.delivery
    }

    pub fn submit_client(&self) -> &SubmitClient {
        &self.submit
    }

    /// Sends `tx` to the engine. A negative acknowledgment becomes
    /// [`GatewayError::DeliveryFailed`](alitas_core::GatewayError::DeliveryFailed).
    pub async fn submit_tx(&self, tx: &[u8]) -> Result<()> {
        self.submit.submit_tx(tx).await
    }

    pub async fn shutdown(self) -> Result<()> {
        let Self {
            delivery,
            submit,
            span,
            ..
        } = self;
        submit.rpc().disconnect().await;
        let result = delivery.shutdown().await;
        info!(parent: &span, "Socket app proxy stopped");
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alitas_testing::RecordingHandler;
    use tokio::net::TcpStream;

    fn loopback_config() -> GatewayConfig {
        GatewayConfig::new()
            .with_proxy_listen("127.0.0.1:0")
            .with_client_connect("127.0.0.1:0")
    }

    #[tokio::test]
    async fn test_gateway_shutdown_releases_listener() {
        let gateway = SocketGateway::bind(&loopback_config(), Span::none())
            .await
            .unwrap();
        let addr = gateway.local_addr();
        assert!(TcpStream::connect(addr).await.is_ok());

        gateway.shutdown().await.unwrap();
        assert!(TcpStream::connect(addr).await.is_err());
    }

    #[tokio::test]
    async fn test_app_proxy_shutdown_releases_listener() {
        let app = SocketAppProxy::bind(RecordingHandler::new(), &loopback_config(), Span::none())
            .await
            .unwrap();
        let addr = app.local_addr();
        assert!(TcpStream::connect(addr).await.is_ok());

        app.shutdown().await.unwrap();
        assert!(TcpStream::connect(addr).await.is_err());
    }
}
