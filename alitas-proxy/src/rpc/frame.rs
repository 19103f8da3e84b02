//! Request/response envelopes and their framing on the stream.
//!
//! Each message is one compact JSON document followed by `\n`. The envelope
//! follows JSON-RPC 1.0: a request names a service-qualified method and
//! carries a single positional parameter, a response echoes the request id
//! and holds either a result or an error string.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use alitas_core::{GatewayError, Result};

const DELIMITER: u8 = b'\n';

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    /// `Service.Method`
    pub method: String,
    pub params: Vec<Value>,
    pub id: u64,
}

impl RpcRequest {
    pub fn new(id: u64, method: impl Into<String>, param: Value) -> Self {
        Self {
            method: method.into(),
            params: vec![param],
            id,
        }
    }

    /// Splits `Service.Method` into its two halves.
    pub fn service_method(&self) -> Option<(&str, &str)> {
        self.method.split_once('.')
    }

    /// The call argument. Missing parameters read as `null`.
    pub fn take_param(&mut self) -> Value {
        if self.params.is_empty() {
            Value::Null
        } else {
            self.params.swap_remove(0)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    pub id: u64,
    #[serde(default)]
    pub result: Value,
    #[serde(default)]
    pub error: Option<String>,
}

impl RpcResponse {
    pub fn ok(id: u64, result: Value) -> Self {
        Self {
            id,
            result,
            error: None,
        }
    }

    pub fn err(id: u64, message: impl Into<String>) -> Self {
        Self {
            id,
            result: Value::Null,
            error: Some(message.into()),
        }
    }

    /// The result, or the peer's error text wrapped in [`GatewayError::Remote`].
    pub fn into_result(self) -> Result<Value> {
        match self.error {
            Some(message) => Err(GatewayError::remote(message)),
            None => Ok(self.result),
        }
    }
}

/// Encodes `message` as one frame, delimiter included.
///
/// A message over `max_message_size` fails with
/// [`GatewayError::MessageTooLarge`]; nothing has touched the stream yet, so
/// the connection stays usable.
pub fn encode_frame<T: Serialize>(message: &T, max_message_size: usize) -> Result<Vec<u8>> {
    let mut buf = serde_json::to_vec(message)?;
    if buf.len() > max_message_size {
        return Err(GatewayError::MessageTooLarge {
            size: buf.len(),
            limit: max_message_size,
        });
    }
    buf.push(DELIMITER);
    Ok(buf)
}

/// Writes a frame produced by [`encode_frame`].
pub async fn write_encoded<W>(writer: &mut W, frame: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer
        .write_all(frame)
        .await
        .map_err(|e| GatewayError::network(format!("Failed to write frame: {}", e)))?;
    writer
        .flush()
        .await
        .map_err(|e| GatewayError::network(format!("Failed to flush frame: {}", e)))
}

/// Encodes `message` and writes it as one frame.
pub async fn write_frame<W, T>(writer: &mut W, message: &T, max_message_size: usize) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let frame = encode_frame(message, max_message_size)?;
    write_encoded(writer, &frame).await
}

/// Reads and decodes the next frame.
///
/// Returns `Ok(None)` when the peer closed the stream between frames.
pub async fn read_frame<R, T>(reader: &mut R, max_message_size: usize) -> Result<Option<T>>
where
    R: AsyncBufRead + Unpin,
    T: DeserializeOwned,
{
    loop {
        let mut buf = Vec::new();
        let limit = max_message_size as u64 + 1;
        let read = (&mut *reader)
            .take(limit)
            .read_until(DELIMITER, &mut buf)
            .await
            .map_err(|e| GatewayError::network(format!("Failed to read frame: {}", e)))?;

        if read == 0 {
            return Ok(None);
        }

        if buf.last() != Some(&DELIMITER) {
            if buf.len() > max_message_size {
                return Err(GatewayError::network(format!(
                    "Frame too large: more than {} bytes",
                    max_message_size
                )));
            }
            return Err(GatewayError::network("Connection closed in the middle of a frame"));
        }
        buf.pop();

        // Tolerate blank keep-alive lines between frames
        if buf.iter().all(u8::is_ascii_whitespace) {
            continue;
        }

        let message = serde_json::from_slice(&buf)
            .map_err(|e| GatewayError::protocol(format!("Failed to decode frame: {}", e)))?;
        return Ok(Some(message));
    }
}
