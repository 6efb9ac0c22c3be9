use serde::Serialize;
use serde::de::DeserializeOwned;

use super::messages::{ClientMessage, ServerMessage};

/// Maximum frame size in bytes. Frames above this are dropped before decode.
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024; // 16 KiB

#[derive(Debug)]
pub enum ProtocolError {
    EmptyMessage,
    PayloadTooLarge(usize),
    SerializeError(String),
    DeserializeError(String),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyMessage => write!(f, "empty message"),
            Self::PayloadTooLarge(size) => {
                write!(f, "payload too large: {size} bytes (max {MAX_MESSAGE_SIZE})")
            },
            Self::SerializeError(e) => write!(f, "serialize error: {e}"),
            Self::DeserializeError(e) => write!(f, "deserialize error: {e}"),
        }
    }
}

impl std::error::Error for ProtocolError {}

fn encode<T: Serialize>(msg: &T) -> Result<String, ProtocolError> {
    let text =
        serde_json::to_string(msg).map_err(|e| ProtocolError::SerializeError(e.to_string()))?;
    if text.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::PayloadTooLarge(text.len()));
    }
    Ok(text)
}

fn decode<T: DeserializeOwned>(text: &str) -> Result<T, ProtocolError> {
    if text.is_empty() {
        return Err(ProtocolError::EmptyMessage);
    }
    if text.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::PayloadTooLarge(text.len()));
    }
    serde_json::from_str(text).map_err(|e| ProtocolError::DeserializeError(e.to_string()))
}

/// Encode a `ServerMessage` to a wire frame.
pub fn encode_server_message(msg: &ServerMessage) -> Result<String, ProtocolError> {
    encode(msg)
}

/// Encode a `ClientMessage` to a wire frame (used by clients and tests).
pub fn encode_client_message(msg: &ClientMessage) -> Result<String, ProtocolError> {
    encode(msg)
}

/// Decode a wire frame into a `ClientMessage`.
pub fn decode_client_message(text: &str) -> Result<ClientMessage, ProtocolError> {
    decode(text)
}

/// Decode a wire frame into a `ServerMessage` (used by clients and tests).
pub fn decode_server_message(text: &str) -> Result<ServerMessage, ProtocolError> {
    decode(text)
}
