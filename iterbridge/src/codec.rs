//! Pluggable serialization for the structural-clone step.
//!
//! A channel pair never hands a live reference across the boundary: every
//! payload is cloned by value when it is sent. The [`MessageCodec`] trait is
//! that clone step — encode on the sending side, decode on the delivering
//! side. The default [`JsonCodec`] keeps payloads human-readable, which is
//! convenient when tracing protocol traffic.
//!
//! A payload that fails to encode is, by definition, not structurally
//! cloneable; the channel surfaces that as a transport failure instead of
//! delivering a malformed message.
//!
//! # Example
//!
//! ```rust
//! use iterbridge::{JsonCodec, MessageCodec};
//!
//! let codec = JsonCodec;
//! let bytes = codec.encode(&vec![1, 2, 3]).unwrap();
//! let decoded: Vec<u32> = codec.decode(&bytes).unwrap();
//! assert_eq!(decoded, vec![1, 2, 3]);
//! ```

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Error type for codec operations.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Failed to encode a payload to bytes.
    #[error("encode error: {0}")]
    Encode(Box<dyn std::error::Error + Send + Sync>),
    /// Failed to decode bytes back into a payload.
    #[error("decode error: {0}")]
    Decode(Box<dyn std::error::Error + Send + Sync>),
}

/// Pluggable structural-clone format for channel payloads.
///
/// Implement this trait to move protocol records through a different
/// serialization format (bincode, messagepack, ...). The trait requires
/// `Clone + 'static` so a codec instance can be stored in each endpoint of
/// a pair.
pub trait MessageCodec: Clone + 'static {
    /// Encode a serializable payload to bytes.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::Encode` if the payload is not structurally
    /// cloneable under this codec.
    fn encode<T: Serialize>(&self, msg: &T) -> Result<Vec<u8>, CodecError>;

    /// Decode bytes back into a payload.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::Decode` if the bytes do not describe a `T`.
    fn decode<T: DeserializeOwned>(&self, buf: &[u8]) -> Result<T, CodecError>;
}

/// JSON codec using serde_json.
///
/// The default codec for entangled pairs. Not the most compact wire form,
/// but every cloneable protocol value has an obvious JSON rendering.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl MessageCodec for JsonCodec {
    fn encode<T: Serialize>(&self, msg: &T) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(msg).map_err(|e| CodecError::Encode(Box::new(e)))
    }

    fn decode<T: DeserializeOwned>(&self, buf: &[u8]) -> Result<T, CodecError> {
        serde_json::from_slice(buf).map_err(|e| CodecError::Decode(Box::new(e)))
    }
}
