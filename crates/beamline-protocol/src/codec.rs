//! Payload codec for session descriptions
//!
//! Signaling carries a session description as standard base64 of its JSON
//! form, the same encoding browsers produce with `btoa(JSON.stringify(desc))`.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use thiserror::Error;

use crate::types::SessionDescription;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Payload is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("Invalid session description JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Encode a session description for transport over signaling
pub fn encode(desc: &SessionDescription) -> String {
    // Serializing a struct of a unit enum and a string cannot fail
    let json = serde_json::to_string(desc).unwrap_or_default();
    BASE64.encode(json)
}

/// Decode a session description received over signaling
pub fn decode(payload: &str) -> Result<SessionDescription, CodecError> {
    let bytes = BASE64.decode(payload.trim())?;
    let json = String::from_utf8(bytes)?;
    Ok(serde_json::from_str(&json)?)
}
