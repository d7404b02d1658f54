//! JSON text codec for signaling frames.
//!
//! One frame carries exactly one JSON object. Decoding never panics on
//! arbitrary input; failures surface as [`ProtocolError`].

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::signal::{ClientMessage, ServerMessage};

/// Errors produced while encoding or decoding a frame.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The frame is not a well-formed message of the expected vocabulary.
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The frame exceeds the configured size limit.
    #[error("message too large: {size} bytes (max {max})")]
    TooLarge {
        /// Frame length in bytes.
        size: usize,
        /// Configured maximum.
        max: usize,
    },
}

/// Encodes any protocol message as a JSON string.
///
/// # Errors
///
/// Returns [`ProtocolError::Malformed`] if serialization fails.
pub fn encode<T: Serialize>(msg: &T) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(msg)?)
}

/// Decodes any protocol message from JSON bytes.
///
/// # Errors
///
/// Returns [`ProtocolError::Malformed`] for invalid JSON, unknown `type`
/// values, or missing required fields.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ProtocolError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Decodes a client frame, rejecting frames larger than `max_size` bytes
/// before parsing them.
///
/// # Errors
///
/// Returns [`ProtocolError::TooLarge`] or [`ProtocolError::Malformed`].
pub fn decode_client(bytes: &[u8], max_size: usize) -> Result<ClientMessage, ProtocolError> {
    if bytes.len() > max_size {
        return Err(ProtocolError::TooLarge {
            size: bytes.len(),
            max: max_size,
        });
    }
    decode(bytes)
}

/// Encodes a hub frame.
///
/// # Errors
///
/// Returns [`ProtocolError::Malformed`] if serialization fails.
pub fn encode_server(msg: &ServerMessage) -> Result<String, ProtocolError> {
    encode(msg)
}
