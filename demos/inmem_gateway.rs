//! Engine and dummy application in one process.
//!
//! Run with `RUST_LOG=debug` to see every delivered call.

use anyhow::Result;
use tracing::{info, info_span};
use tracing_subscriber::EnvFilter;

use alitas_core::crypto::encode_to_string;
use alitas_core::{AppGateway, Block, LifecycleState, VERSION};
use alitas_proxy::InmemProxy;
use alitas_testing::{random_transactions, DummyState};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    info!("Alitas in-process gateway demo v{}", VERSION);

    let app = DummyState::with_span(info_span!("app"));
    let proxy = InmemProxy::new(app.clone(), Some(128), info_span!("inmem_proxy"));
    let mut submitted = proxy
        .take_submit_rx()
        .ok_or_else(|| anyhow::anyhow!("submit queue already taken"))?;

    proxy.on_state_changed(LifecycleState::Babbling).await?;

    // The application submits, the "engine" drains the queue and orders the
    // transactions into blocks of four.
    for tx in random_transactions(12, 32) {
        proxy.submit_tx(&tx).await?;
    }

    let mut pending = Vec::new();
    while let Some(tx) = submitted.try_recv() {
        pending.push(tx);
    }

    for (index, chunk) in pending.chunks(4).enumerate() {
        let index = index as u64 + 1;
        let block = Block::new(index, index, format!("frame-{}", index), chunk.to_vec());
        let response = proxy.commit_block(block).await?;
        info!(
            block = index,
            state_hash = %encode_to_string(&response.state_hash),
            "Block committed"
        );
    }

    let snapshot = proxy.get_snapshot(2).await?;
    let restored = proxy.restore(snapshot).await?;
    info!(state_hash = %encode_to_string(&restored), "Restored to block 2");

    proxy.on_state_changed(LifecycleState::Shutdown).await?;
    info!(
        "Applied {} transactions",
        app.committed_transactions().len()
    );
    Ok(())
}
