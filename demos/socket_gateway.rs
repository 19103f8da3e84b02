//! Engine side and application side of a socket gateway, run in one process
//! over loopback TCP.
//!
//! Pass two addresses to override the defaults:
//! `socket_gateway <proxy_listen> <client_connect>`.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{info, info_span, warn};
use tracing_subscriber::EnvFilter;

use alitas_core::crypto::encode_to_string;
use alitas_core::{AppGateway, Block, GatewayConfig, LifecycleState, VERSION};
use alitas_proxy::{SocketAppProxy, SocketGateway};
use alitas_testing::DummyState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let mut config = GatewayConfig::new().with_call_timeout(Duration::from_secs(5));
    if let Some(proxy_listen) = args.next() {
        config = config.with_proxy_listen(proxy_listen);
    }
    if let Some(client_connect) = args.next() {
        config = config.with_client_connect(client_connect);
    }

    info!(
        proxy_listen = %config.proxy_listen,
        client_connect = %config.client_connect,
        "Alitas socket gateway demo v{}",
        VERSION
    );

    let gateway = SocketGateway::bind(&config, info_span!("engine"))
        .await
        .context("starting engine side")?;
    let app = SocketAppProxy::bind(DummyState::new(), &config, info_span!("app"))
        .await
        .context("starting application side")?;
    let mut submitted = gateway
        .take_submit_rx()
        .context("submit queue already taken")?;

    gateway.on_state_changed(LifecycleState::Babbling).await?;

    for (round, batch) in [["alice->bob 5", "bob->carol 2"], ["carol->alice 1", "bob->alice 4"]]
        .iter()
        .enumerate()
    {
        for tx in batch {
            app.submit_tx(tx.as_bytes()).await?;
        }

        let mut transactions = Vec::new();
        for _ in 0..batch.len() {
            match submitted.recv().await {
                Some(tx) => transactions.push(tx),
                None => {
                    warn!("Submit queue closed early");
                    break;
                }
            }
        }

        let index = round as u64 + 1;
        let block = Block::new(index, index, format!("frame-{}", index), transactions);
        let response = gateway.commit_block(block).await?;
        info!(
            block = index,
            state_hash = %encode_to_string(&response.state_hash),
            "Block committed over TCP"
        );
    }

    gateway.on_state_changed(LifecycleState::Shutdown).await?;

    app.shutdown().await?;
    gateway.shutdown().await?;
    Ok(())
}
