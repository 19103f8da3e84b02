//! Submission direction: the application pushes transactions to the engine.
//!
//! The engine hosts [`SubmitService`] on an [`RpcServer`]; the application
//! calls it through [`SubmitClient`]. Wire surface: `Alitas.SubmitTx(tx) -> bool`,
//! with the transaction as a base64 string.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, Span};

use alitas_core::{
    Base64Bytes, Base64Slice, GatewayConfig, GatewayError, Result, SubmitSender, Transaction,
};

use crate::rpc::{RpcClient, RpcServer, RpcService};

/// Service name of the submission direction.
pub const SUBMIT_SERVICE: &str = "Alitas";

/// `Alitas.SubmitTx`
pub const SUBMIT_TX: &str = "SubmitTx";

fn qualified(method: &str) -> String {
    format!("{}.{}", SUBMIT_SERVICE, method)
}

/// Engine-side method table: every submitted transaction goes into the
/// hand-off queue.
///
/// The acknowledgment is `true` once the transaction is queued and `false`
/// when the engine no longer consumes the queue.
#[derive(Debug, Clone)]
pub struct SubmitService {
    sender: SubmitSender,
    span: Span,
}

impl SubmitService {
    pub fn new(sender: SubmitSender, span: Span) -> Self {
        Self { sender, span }
    }

    pub async fn bind(self, addr: &str) -> Result<RpcServer<Self>> {
        let span = self.span.clone();
        RpcServer::bind(addr, self, span).await
    }

    async fn submit_tx(&self, tx: Transaction) -> bool {
        match self.sender.submit(&tx).await {
            Ok(()) => {
                debug!(parent: &self.span, bytes = tx.len(), "SubmitService.SubmitTx");
                true
            }
            Err(e) => {
                debug!(parent: &self.span, error = %e, "SubmitService.SubmitTx rejected");
                false
            }
        }
    }
}

#[async_trait]
impl RpcService for SubmitService {
    fn name(&self) -> &'static str {
        SUBMIT_SERVICE
    }

    async fn call(&self, method: &str, param: Value) -> Result<Value> {
        match method {
            SUBMIT_TX => {
                let Base64Bytes(tx) = serde_json::from_value(param)?;
                Ok(Value::Bool(self.submit_tx(tx).await))
            }
            _ => Err(GatewayError::UnknownMethod {
                method: qualified(method),
            }),
        }
    }
}

/// Application-side client for the engine's submission listener.
#[derive(Debug)]
pub struct SubmitClient {
    rpc: RpcClient,
}

impl SubmitClient {
    pub fn new(node_addr: impl Into<String>, dial_timeout: Duration, span: Span) -> Self {
        Self {
            rpc: RpcClient::new(node_addr, dial_timeout, span),
        }
    }

    /// Client for `config.proxy_listen`.
    pub fn from_config(config: &GatewayConfig, span: Span) -> Self {
        Self {
            rpc: RpcClient::with_config(config.proxy_listen.clone(), config, span),
        }
    }

    pub fn rpc(&self) -> &RpcClient {
        &self.rpc
    }

    /// Raw acknowledgment from the engine.
    pub async fn submit_tx_ack(&self, tx: &[u8]) -> Result<bool> {
        self.rpc.call(&qualified(SUBMIT_TX), &Base64Slice(tx)).await
    }

    /// Submits `tx`, turning a `false` acknowledgment into
    /// [`GatewayError::DeliveryFailed`].
    pub async fn submit_tx(&self, tx: &[u8]) -> Result<()> {
        if self.submit_tx_ack(tx).await? {
            Ok(())
        } else {
            Err(GatewayError::DeliveryFailed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alitas_core::submit_queue;

    #[tokio::test]
    async fn test_service_queues_transactions() {
        let (sender, mut receiver) = submit_queue(None);
        let service = SubmitService::new(sender, Span::none());

        let ack = service
            .call(SUBMIT_TX, serde_json::to_value(Base64Slice(b"tx1")).unwrap())
            .await
            .unwrap();
        assert_eq!(ack, Value::Bool(true));
        assert_eq!(receiver.recv().await.unwrap().as_ref(), b"tx1");
    }

    #[tokio::test]
    async fn test_service_nacks_when_engine_is_gone() {
        let (sender, receiver) = submit_queue(None);
        drop(receiver);
        let service = SubmitService::new(sender, Span::none());

        let ack = service
            .call(SUBMIT_TX, serde_json::to_value(Base64Slice(b"tx1")).unwrap())
            .await
            .unwrap();
        assert_eq!(ack, Value::Bool(false));
    }

    #[tokio::test]
    async fn test_service_rejects_unknown_method() {
        let (sender, _receiver) = submit_queue(None);
        let service = SubmitService::new(sender, Span::none());

        let err = service.call("Submit", Value::Null).await.unwrap_err();
        assert_eq!(err.to_string(), "rpc: can't find method Alitas.Submit");
    }

    #[tokio::test]
    async fn test_service_rejects_raw_byte_arrays() {
        let (sender, mut receiver) = submit_queue(None);
        let service = SubmitService::new(sender, Span::none());

        let err = service
            .call(SUBMIT_TX, serde_json::json!([116, 120]))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Serialization(_)));
        assert!(receiver.try_recv().is_none());
    }
}
