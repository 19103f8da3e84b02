//! Wire form of byte strings.
//!
//! Every byte field crossing the gateway is a standard base64 string in JSON
//! (`null` reads as empty). Struct fields opt in with
//! `#[serde(with = "crate::encoding::base64_bytes")]`; bare byte arguments
//! and results of RPC calls go through [`Base64Bytes`] and [`Base64Slice`].

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use bytes::Bytes;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub fn encode(data: &[u8]) -> String {
    BASE64.encode(data)
}

pub fn decode(text: &str) -> std::result::Result<Bytes, base64::DecodeError> {
    BASE64.decode(text).map(Bytes::from)
}

/// `serde(with)` module for a single `Bytes` field.
pub mod base64_bytes {
    use super::*;

    pub fn serialize<S: Serializer>(data: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(text) => decode(&text).map_err(serde::de::Error::custom),
            None => Ok(Bytes::new()),
        }
    }
}

/// `serde(with)` module for a `Vec<Bytes>` field.
pub mod base64_vec {
    use super::*;

    pub fn serialize<S: Serializer>(items: &[Bytes], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(items.iter().map(|item| encode(item)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Bytes>, D::Error> {
        Option::<Vec<String>>::deserialize(deserializer)?
            .unwrap_or_default()
            .iter()
            .map(|text| decode(text).map_err(serde::de::Error::custom))
            .collect()
    }
}

/// Owned byte string with the base64 wire form.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Base64Bytes(pub Bytes);

impl Serialize for Base64Bytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        base64_bytes::serialize(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for Base64Bytes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        base64_bytes::deserialize(deserializer).map(Base64Bytes)
    }
}

/// Borrowed byte string with the base64 wire form, for sending without a copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Base64Slice<'a>(pub &'a [u8]);

impl Serialize for Base64Slice<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&encode(self.0))
    }
}
