use bytes::Bytes;
use rand::Rng;

use alitas_core::{Block, Transaction};

/// A transaction holding `text`.
pub fn tx(text: &str) -> Transaction {
    Bytes::copy_from_slice(text.as_bytes())
}

/// A block at `index` (round received = index) with one transaction per entry.
pub fn block(index: u64, txs: &[&str]) -> Block {
    Block::new(
        index,
        index,
        Bytes::from(format!("frame-{}", index)),
        txs.iter().map(|t| tx(t)).collect(),
    )
}

/// `count` transactions of `size` random bytes each.
pub fn random_transactions(count: usize, size: usize) -> Vec<Transaction> {
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|_| {
            let data: Vec<u8> = (0..size).map(|_| rng.gen()).collect();
            Bytes::from(data)
        })
        .collect()
}
