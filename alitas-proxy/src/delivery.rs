//! Delivery direction: the engine pushes commits, snapshot requests,
//! restores and state changes to the application.
//!
//! The application hosts [`StateService`] around its [`ProxyHandler`]; the
//! engine calls it through [`DeliveryClient`].
//!
//! | Method                 | Argument         | Result           |
//! |------------------------|------------------|------------------|
//! | `State.CommitBlock`    | `Block`          | `CommitResponse` |
//! | `State.GetSnapshot`    | block index      | snapshot bytes   |
//! | `State.Restore`        | snapshot bytes   | state hash bytes |
//!
//! Bytes travel as base64 strings.
//! | `State.OnStateChanged` | `LifecycleState` | `null`           |

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, Span};

use alitas_core::{
    Base64Bytes, Base64Slice, Block, CommitResponse, GatewayConfig, GatewayError, LifecycleState,
    ProxyHandler, Result, Snapshot, StateHash,
};

use crate::rpc::{RpcClient, RpcServer, RpcService};

/// Service name of the delivery direction.
pub const STATE_SERVICE: &str = "State";

pub const COMMIT_BLOCK: &str = "CommitBlock";
pub const GET_SNAPSHOT: &str = "GetSnapshot";
pub const RESTORE: &str = "Restore";
pub const ON_STATE_CHANGED: &str = "OnStateChanged";

fn qualified(method: &str) -> String {
    format!("{}.{}", STATE_SERVICE, method)
}

/// Application-side method table backed by a local handler.
#[derive(Debug)]
pub struct StateService<H> {
    handler: H,
    span: Span,
}

impl<H: ProxyHandler + 'static> StateService<H> {
    pub fn new(handler: H, span: Span) -> Self {
        Self { handler, span }
    }

    pub async fn bind(self, addr: &str) -> Result<RpcServer<Self>> {
        let span = self.span.clone();
        RpcServer::bind(addr, self, span).await
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    async fn commit_block(&self, block: Block) -> Result<CommitResponse> {
        let index = block.index();
        let txs = block.transactions().len();
        let result = self.handler.commit_handler(block).await;

        debug!(
            parent: &self.span,
            block = index,
            txs,
            response = ?result.as_ref().ok(),
            err = ?result.as_ref().err(),
            "StateService.CommitBlock"
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
            "StateService.GetSnapshot"
        );
        result
    }

    async fn restore(&self, snapshot: Snapshot) -> Result<StateHash> {
        let result = self.handler.restore_handler(snapshot).await;

        debug!(
            parent: &self.span,
            state_hash = ?result.as_ref().ok(),
            err = ?result.as_ref().err(),
            "StateService.Restore"
        );
        result
    }

    async fn on_state_changed(&self, state: LifecycleState) -> Result<()> {
        let result = self.handler.state_change_handler(state).await;

        debug!(
            parent: &self.span,
            state = %state,
            err = ?result.as_ref().err(),
            "StateService.OnStateChanged"
        );
        result
    }
}

#[async_trait]
impl<H: ProxyHandler + 'static> RpcService for StateService<H> {
    fn name(&self) -> &'static str {
        STATE_SERVICE
    }

    async fn call(&self, method: &str, param: Value) -> Result<Value> {
        match method {
            COMMIT_BLOCK => {
                let response = self.commit_block(serde_json::from_value(param)?).await?;
                Ok(serde_json::to_value(response)?)
            }
            GET_SNAPSHOT => {
                let snapshot = self.get_snapshot(serde_json::from_value(param)?).await?;
                Ok(serde_json::to_value(Base64Bytes(snapshot))?)
            }
            RESTORE => {
                let Base64Bytes(snapshot) = serde_json::from_value(param)?;
                let state_hash = self.restore(snapshot).await?;
                Ok(serde_json::to_value(Base64Bytes(state_hash))?)
            }
            ON_STATE_CHANGED => {
                self.on_state_changed(serde_json::from_value(param)?).await?;
                Ok(Value::Null)
            }
            _ => Err(GatewayError::UnknownMethod {
                method: qualified(method),
            }),
        }
    }
}

/// Engine-side client for an application's delivery listener.
///
/// Each call blocks until the application answers. Transport errors drop
/// the cached connection; handler errors come back as
/// [`GatewayError::Remote`] with the handler's message unchanged.
#[derive(Debug)]
pub struct DeliveryClient {
    rpc: RpcClient,
    span: Span,
}

impl DeliveryClient {
    pub fn new(client_addr: impl Into<String>, dial_timeout: Duration, span: Span) -> Self {
        Self {
            rpc: RpcClient::new(client_addr, dial_timeout, span.clone()),
            span,
        }
    }

    /// Client for `config.client_connect`.
    pub fn from_config(config: &GatewayConfig, span: Span) -> Self {
        Self {
            rpc: RpcClient::with_config(config.client_connect.clone(), config, span.clone()),
            span,
        }
    }

    pub fn rpc(&self) -> &RpcClient {
        &self.rpc
    }

    pub async fn commit_block(&self, block: &Block) -> Result<CommitResponse> {
        let response: CommitResponse = self.rpc.call(&qualified(COMMIT_BLOCK), block).await?;

        debug!(
            parent: &self.span,
            block = block.index(),
            commit_response = ?response,
            "DeliveryClient.CommitBlock"
        );
        Ok(response)
    }

    pub async fn get_snapshot(&self, block_index: u64) -> Result<Snapshot> {
        let Base64Bytes(snapshot) = self.rpc.call(&qualified(GET_SNAPSHOT), &block_index).await?;

        debug!(
            parent: &self.span,
            block = block_index,
            snapshot_len = snapshot.len(),
            "DeliveryClient.GetSnapshot"
        );
        Ok(snapshot)
    }

    pub async fn restore(&self, snapshot: &[u8]) -> Result<StateHash> {
        let Base64Bytes(state_hash) = self.rpc.call(&qualified(RESTORE), &Base64Slice(snapshot)).await?;

        debug!(parent: &self.span, state_hash = ?state_hash, "DeliveryClient.Restore");
        Ok(state_hash)
    }

    pub async fn on_state_changed(&self, state: LifecycleState) -> Result<()> {
        let _: Value = self.rpc.call(&qualified(ON_STATE_CHANGED), &state).await?;

        debug!(parent: &self.span, state = %state, "DeliveryClient.OnStateChanged");
        Ok(())
    }
}
