use serde::{Deserialize, Serialize};

/// Kind of a session description in the offer/answer exchange
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    Offer,
    Answer,
    Pranswer,
    Rollback,
}

impl std::fmt::Display for SdpType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SdpType::Offer => write!(f, "offer"),
            SdpType::Answer => write!(f, "answer"),
            SdpType::Pranswer => write!(f, "pranswer"),
            SdpType::Rollback => write!(f, "rollback"),
        }
    }
}

/// A session description as browsers serialize it: `{"type": ..., "sdp": ...}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub sdp_type: SdpType,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Answer,
            sdp: sdp.into(),
        }
    }

    /// Number of ICE candidates embedded in the SDP body
    pub fn candidate_count(&self) -> usize {
        self.sdp.matches("a=candidate:").count()
    }
}

/// Snapshot of the room, served by the status endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoomStatus {
    /// Publishers accepted so far (never more than one)
    pub publisher_count: u32,
    /// Viewer sessions negotiated so far
    pub viewer_count: u32,
    /// Whether the shared relay track exists
    pub relay_ready: bool,
    /// Whether the publisher's ingest loop is still running
    pub publisher_live: bool,
    /// Open signaling connections
    pub connections: u32,
}
