//! # Core Types
//!
//! Values that cross the gateway: transactions, committed blocks, the
//! application's answer to a commit, and the engine's lifecycle state.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::crypto::sha256;
use crate::encoding::{base64_bytes, base64_vec};
use crate::Result;

/// An opaque transaction. The gateway never looks inside it.
pub type Transaction = Bytes;

/// Opaque application state captured at a block index.
pub type Snapshot = Bytes;

/// Identity of the application state, returned by commits and restores.
pub type StateHash = Bytes;

/// Content of a block as produced by the consensus engine.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BlockBody {
    /// Position of the block in the chain, strictly increasing
    pub index: u64,
    /// Consensus round in which the block's transactions were received
    pub round_received: u64,
    /// Application state hash after the previous block, if already known
    #[serde(with = "base64_bytes")]
    pub state_hash: Bytes,
    /// Hash of the frame the block was built from
    #[serde(with = "base64_bytes")]
    pub frame_hash: Bytes,
    /// Transactions in consensus order
    #[serde(with = "base64_vec")]
    pub transactions: Vec<Transaction>,
}

/// A finalized batch of transactions delivered to the application.
///
/// The engine hands blocks to the gateway in strictly increasing index order,
/// without gaps or duplicates. The gateway does not check this.
///
/// # Examples
///
/// ```rust
/// use alitas_core::Block;
/// use bytes::Bytes;
///
/// let block = Block::new(1, 4, Bytes::new(), vec![Bytes::from_static(b"tx1")]);
/// assert_eq!(block.index(), 1);
/// assert_eq!(block.transactions().len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Block {
    pub body: BlockBody,
    /// Validator public key (hex) to signature
    pub signatures: BTreeMap<String, String>,
}

impl Block {
    pub fn new(
        index: u64,
        round_received: u64,
        frame_hash: impl Into<Bytes>,
        transactions: Vec<Transaction>,
    ) -> Self {
        Self {
            body: BlockBody {
                index,
                round_received,
                state_hash: Bytes::new(),
                frame_hash: frame_hash.into(),
                transactions,
            },
            signatures: BTreeMap::new(),
        }
    }

    pub fn index(&self) -> u64 {
        self.body.index
    }

    pub fn round_received(&self) -> u64 {
        self.body.round_received
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.body.transactions
    }

    pub fn state_hash(&self) -> &Bytes {
        &self.body.state_hash
    }

    pub fn frame_hash(&self) -> &Bytes {
        &self.body.frame_hash
    }

    pub fn marshal(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn unmarshal(data: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(data)?)
    }

    /// SHA-256 of the JSON encoded body. Signatures are not covered.
    pub fn hash(&self) -> Result<Vec<u8>> {
        let body = serde_json::to_vec(&self.body)?;
        Ok(sha256(&body))
    }
}

/// The application's acknowledgment of a committed block.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CommitResponse {
    /// Application state hash after applying the block
    #[serde(with = "base64_bytes")]
    pub state_hash: StateHash,
    /// Set when the application applied the block but wants to flag a problem
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CommitResponse {
    pub fn new(state_hash: impl Into<StateHash>) -> Self {
        Self {
            state_hash: state_hash.into(),
            error: None,
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Operating phase of an Alitas node, pushed to the application as it changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LifecycleState {
    /// Gossiping and committing blocks normally
    Babbling,
    /// Fast-syncing from peers after falling behind
    CatchingUp,
    /// Requesting admission to the validator set
    Joining,
    /// Leaving the validator set
    Leaving,
    /// Stopped
    Shutdown,
    /// Temporarily not taking part in consensus
    Suspended,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleState::Babbling => write!(f, "Babbling"),
            LifecycleState::CatchingUp => write!(f, "CatchingUp"),
            LifecycleState::Joining => write!(f, "Joining"),
            LifecycleState::Leaving => write!(f, "Leaving"),
            LifecycleState::Shutdown => write!(f, "Shutdown"),
            LifecycleState::Suspended => write!(f, "Suspended"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_block() -> Block {
        Block::new(
            7,
            3,
            Bytes::from_static(b"frame"),
            vec![Bytes::from_static(b"tx1"), Bytes::from_static(b"tx2")],
        )
    }

    #[test]
    fn test_block_accessors() {
        let block = sample_block();
        assert_eq!(block.index(), 7);
        assert_eq!(block.round_received(), 3);
        assert_eq!(block.frame_hash().as_ref(), b"frame");
        assert!(block.state_hash().is_empty());
        assert_eq!(block.transactions()[1].as_ref(), b"tx2");
    }

    #[test]
    fn test_block_marshal() {
        let mut block = sample_block();
        block
            .signatures
            .insert("0XAA".to_string(), "sig".to_string());

        let data = block.marshal().unwrap();
        assert_eq!(Block::unmarshal(&data).unwrap(), block);
    }

    #[test]
    fn test_block_hash_ignores_signatures() {
        let plain = sample_block();
        let mut signed = sample_block();
        signed
            .signatures
            .insert("0XAA".to_string(), "sig".to_string());

        assert_eq!(plain.hash().unwrap(), signed.hash().unwrap());

        let other = Block::new(8, 3, Bytes::from_static(b"frame"), vec![]);
        assert_ne!(plain.hash().unwrap(), other.hash().unwrap());
    }

    #[test]
    fn test_commit_response_error_is_optional_on_the_wire() {
        let ok = CommitResponse::new(Bytes::from_static(b"hash"));
        let json = serde_json::to_string(&ok).unwrap();
        assert!(!json.contains("error"));

        let decoded: CommitResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, ok);
        assert!(decoded.is_ok());

        let flagged = ok.with_error("replayed block");
        assert!(!flagged.is_ok());
    }

    #[test]
    fn test_byte_fields_are_base64_on_the_wire() {
        let json = serde_json::to_value(sample_block()).unwrap();
        assert_eq!(json["body"]["frame_hash"], "ZnJhbWU=");
        assert_eq!(json["body"]["transactions"][0], "dHgx");

        let response = CommitResponse::new(Bytes::from_static(b"hash"));
        assert_eq!(serde_json::to_value(response).unwrap()["state_hash"], "aGFzaA==");
    }

    #[test]
    fn test_lifecycle_state_names() {
        assert_eq!(LifecycleState::CatchingUp.to_string(), "CatchingUp");
        let json = serde_json::to_string(&LifecycleState::Suspended).unwrap();
        assert_eq!(json, "\"Suspended\"");
        let state: LifecycleState = serde_json::from_str("\"Babbling\"").unwrap();
        assert_eq!(state, LifecycleState::Babbling);
    }
}
