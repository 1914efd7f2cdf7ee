use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Messages sent from a browser to the server via WebSocket
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Encoded session description offer (see [`crate::codec`])
    Sdp { payload: String },

    /// Ping to keep connection alive
    Ping,
}

/// Messages sent from the server to a browser via WebSocket
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Signaling connection accepted
    Connected { connection_id: Uuid },

    /// Encoded session description answer
    Sdp { payload: String },

    /// Error message
    Error { message: String },

    /// Pong response to ping
    Pong,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_sdp_wire_format() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"sdp","payload":"eyJ0eXBlIjoib2ZmZXIifQ=="}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Sdp {
                payload: "eyJ0eXBlIjoib2ZmZXIifQ==".to_string()
            }
        );
    }

    #[test]
    fn test_client_ping_wire_format() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert_eq!(msg, ClientMessage::Ping);
    }

    #[test]
    fn test_server_messages_are_tagged() {
        let json = serde_json::to_value(ServerMessage::Sdp {
            payload: "abc".to_string(),
        })
        .unwrap();
        assert_eq!(json["type"], "sdp");
        assert_eq!(json["payload"], "abc");

        let json = serde_json::to_value(ServerMessage::Pong).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "pong" }));
    }

    #[test]
    fn test_unknown_type_rejected() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"authenticate"}"#).is_err());
    }
}
