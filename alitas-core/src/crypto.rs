//! Content hashing helpers shared by [`Block`](crate::Block) and [`Root`](crate::Root).

use sha2::{Digest, Sha256};

/// SHA-256 digest of `data`.
pub fn sha256(data: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

/// Human readable form of a hash: `0X` followed by uppercase hex.
///
/// ```rust
/// use alitas_core::crypto::encode_to_string;
///
/// assert_eq!(encode_to_string(&[0xab, 0x01]), "0XAB01");
/// ```
pub fn encode_to_string(hash: &[u8]) -> String {
    format!("0X{}", hex::encode_upper(hash))
}
