//! Beamline server library
//!
//! A single-room SFU: the first WebRTC offer received becomes the publisher,
//! every later offer becomes a viewer fed from the publisher's stream.
//! This module exposes the server components for testing and embedding.

pub mod api;
pub mod config;
pub mod error;
pub mod sfu;
pub mod signaling;
pub mod state;
pub mod transport;

use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::sfu::Room;
use crate::signaling::{request_queue, ConnectionManager, SignalingGateway};
use crate::transport::MediaTransport;

/// Handle to the spawned room coordinator. Resolves with an error when the
/// room stops on a fatal failure.
pub type RoomHandle = JoinHandle<error::Result<()>>;

/// Wire the request queue, signaling gateway and room, spawn the room
/// coordinator, and build the HTTP router.
pub fn create_app<T: MediaTransport>(
    config: config::Config,
    transport: T,
) -> (axum::Router, RoomHandle) {
    let (requests, queue) = request_queue(config.request_queue_capacity);
    let gateway = SignalingGateway::new(requests, Arc::new(ConnectionManager::new()));

    let room = Room::new(transport, config.room_config());
    let stats = room.stats();
    let room_task = tokio::spawn(room.run(queue));

    let app_state = state::AppState::new(config, gateway, stats);
    let router = api::create_router(app_state);
    (router, room_task)
}
