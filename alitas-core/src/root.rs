//! # Root
//!
//! The base of a participant's event history. A joining participant receives
//! one `Root` per peer and inserts its own events on top of it.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::crypto::{encode_to_string, sha256};
use crate::encoding::base64_vec;
use crate::Result;

/// The signed part of a hashgraph event.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EventBody {
    /// Public key of the creator, hex encoded
    pub creator: String,
    /// Position of the event in its creator's sequence
    pub index: i64,
    /// Hash of the creator's previous event
    pub self_parent: String,
    /// Hash of the event received from another participant
    pub other_parent: String,
    #[serde(with = "base64_vec")]
    pub transactions: Vec<Bytes>,
    /// Creation time, nanoseconds since the Unix epoch
    pub timestamp: i64,
}

/// An event together with the consensus metadata it had inside its frame.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FrameEvent {
    pub core: EventBody,
    pub round: i64,
    pub lamport_timestamp: i64,
    pub witness: bool,
}

/// Ordered, append-only list of [`FrameEvent`]s for one participant.
///
/// Events are expected in topological order (sorted by Lamport timestamp).
/// `insert` does not check this.
///
/// The encoding is deterministic JSON, so equal roots always marshal to the
/// same bytes and therefore hash to the same value.
///
/// # Examples
///
/// ```rust
/// use alitas_core::{FrameEvent, Root};
///
/// let mut root = Root::new();
/// root.insert(FrameEvent::default());
///
/// let data = root.marshal().unwrap();
/// assert_eq!(Root::unmarshal(&data).unwrap(), root);
/// assert!(root.hash().unwrap().starts_with("0X"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Root {
    events: Vec<FrameEvent>,
}

impl Root {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an event. Callers insert in topological order.
    pub fn insert(&mut self, frame_event: FrameEvent) {
        self.events.push(frame_event);
    }

    pub fn events(&self) -> &[FrameEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn marshal(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn unmarshal(data: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(data)?)
    }

    /// SHA-256 of the marshalled root, encoded as `0X` + uppercase hex.
    pub fn hash(&self) -> Result<String> {
        let data = self.marshal()?;
        Ok(encode_to_string(&sha256(&data)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn frame_event(creator: &str, index: i64, lamport: i64) -> FrameEvent {
        FrameEvent {
            core: EventBody {
                creator: creator.to_string(),
                index,
                self_parent: format!("{}-{}", creator, index - 1),
                other_parent: String::new(),
                transactions: vec![Bytes::from(format!("tx-{}", index))],
                timestamp: 1_000 + index,
            },
            round: index / 2,
            lamport_timestamp: lamport,
            witness: index % 2 == 0,
        }
    }

    fn arb_frame_event() -> impl Strategy<Value = FrameEvent> {
        (
            "[0-9A-F]{0,8}",
            any::<i64>(),
            "[0-9A-F]{0,8}",
            "[0-9A-F]{0,8}",
            prop::collection::vec(prop::collection::vec(any::<u8>(), 0..16), 0..4),
            any::<i64>(),
            any::<i64>(),
            any::<i64>(),
            any::<bool>(),
        )
            .prop_map(
                |(creator, index, self_parent, other_parent, txs, timestamp, round, lamport, witness)| {
                    FrameEvent {
                        core: EventBody {
                            creator,
                            index,
                            self_parent,
                            other_parent,
                            transactions: txs.into_iter().map(Bytes::from).collect(),
                            timestamp,
                        },
                        round,
                        lamport_timestamp: lamport,
                        witness,
                    }
                },
            )
    }

    #[test]
    fn test_empty_root() {
        let root = Root::new();
        assert!(root.is_empty());

        let data = root.marshal().unwrap();
        let decoded = Root::unmarshal(&data).unwrap();
        assert_eq!(decoded, root);
        assert_eq!(decoded.len(), 0);
    }

    #[test]
    fn test_insert_keeps_order() {
        let mut root = Root::new();
        root.insert(frame_event("alice", 0, 0));
        root.insert(frame_event("alice", 1, 3));
        root.insert(frame_event("alice", 2, 5));

        let lamports: Vec<i64> = root.events().iter().map(|e| e.lamport_timestamp).collect();
        assert_eq!(lamports, vec![0, 3, 5]);
    }

    #[test]
    fn test_hash_changes_with_content() {
        let mut a = Root::new();
        a.insert(frame_event("alice", 0, 0));

        let mut b = a.clone();
        assert_eq!(a.hash().unwrap(), b.hash().unwrap());

        b.insert(frame_event("alice", 1, 1));
        assert_ne!(a.hash().unwrap(), b.hash().unwrap());

        // "0X" + 64 hex digits
        assert_eq!(a.hash().unwrap().len(), 66);
    }

    #[test]
    fn test_unmarshal_rejects_garbage() {
        assert!(Root::unmarshal(b"{not json").is_err());
    }

    proptest! {
        #[test]
        fn prop_marshal_round_trip(events in prop::collection::vec(arb_frame_event(), 0..8)) {
            let mut root = Root::new();
            for event in events {
                root.insert(event);
            }

            let data = root.marshal().unwrap();
            let decoded = Root::unmarshal(&data).unwrap();
            prop_assert_eq!(&decoded, &root);
            prop_assert_eq!(decoded.hash().unwrap(), root.hash().unwrap());
        }
    }
}
