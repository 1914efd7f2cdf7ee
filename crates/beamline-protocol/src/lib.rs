//! Shared protocol definitions for Beamline
//!
//! Signaling frames exchanged over the WebSocket, the session description
//! value carried inside them, and the payload codec used to move a session
//! description through signaling as an opaque string.

pub mod codec;
pub mod messages;
pub mod types;

pub use codec::{decode, encode, CodecError};
pub use messages::{ClientMessage, ServerMessage};
pub use types::{RoomStatus, SdpType, SessionDescription};
