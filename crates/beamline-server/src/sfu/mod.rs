//! SFU (Selective Forwarding Unit) for a single room
//!
//! One publisher pushes a video track; every viewer is fed from one shared
//! relay track without any processing or transcoding. The room coordinator
//! negotiates every session in arrival order, the relay copies the
//! publisher's packets onto the shared track, and the keepalive keeps the
//! publisher producing keyframes for late joiners.

mod keepalive;
mod relay;
mod room;

pub use relay::{RelayConfig, DEFAULT_BUFFER_SIZE, DEFAULT_PLI_INTERVAL};
pub use room::{ErrorPolicy, Room, RoomConfig, RoomState};

use beamline_protocol::RoomStatus;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Room counters readable from outside the coordinator task
#[derive(Debug, Default)]
pub struct RoomStats {
    publisher_count: AtomicU32,
    viewer_count: AtomicU32,
    relay_ready: AtomicBool,
    publisher_live: AtomicBool,
}

impl RoomStats {
    pub fn publisher_count(&self) -> u32 {
        self.publisher_count.load(Ordering::Acquire)
    }

    pub fn viewer_count(&self) -> u32 {
        self.viewer_count.load(Ordering::Acquire)
    }

    pub fn relay_ready(&self) -> bool {
        self.relay_ready.load(Ordering::Acquire)
    }

    pub fn publisher_live(&self) -> bool {
        self.publisher_live.load(Ordering::Acquire)
    }

    pub fn snapshot(&self, connections: u32) -> RoomStatus {
        RoomStatus {
            publisher_count: self.publisher_count(),
            viewer_count: self.viewer_count(),
            relay_ready: self.relay_ready(),
            publisher_live: self.publisher_live(),
            connections,
        }
    }

    fn publisher_accepted(&self) {
        self.publisher_count.fetch_add(1, Ordering::AcqRel);
        self.relay_ready.store(true, Ordering::Release);
    }

    fn viewer_added(&self) {
        self.viewer_count.fetch_add(1, Ordering::AcqRel);
    }

    fn set_publisher_live(&self, live: bool) {
        self.publisher_live.store(live, Ordering::Release);
    }
}
