//! Signaling gateway
//!
//! Relays opaque session description payloads between browsers and the room
//! coordinator. Nothing here looks inside a payload.

pub mod connections;
pub mod handler;
pub mod queue;

use beamline_protocol::ServerMessage;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::Result;

pub use connections::ConnectionManager;
pub use queue::{request_queue, RequestReceiver, RequestSender, RequestSource, SessionRequest};

/// Addresses the reply for one request back to the connection that sent it
#[derive(Clone)]
pub struct ReplyHandle {
    connection_id: Uuid,
    outbound: mpsc::UnboundedSender<String>,
}

impl ReplyHandle {
    pub fn new(connection_id: Uuid, outbound: mpsc::UnboundedSender<String>) -> Self {
        Self {
            connection_id,
            outbound,
        }
    }

    pub fn connection_id(&self) -> Uuid {
        self.connection_id
    }

    /// Send an encoded answer. Never blocks: frames go onto the connection's
    /// unbounded outbound channel in the order they are sent.
    pub fn send_answer(&self, payload: String) {
        self.send(ServerMessage::Sdp { payload });
    }

    pub fn send_error(&self, message: String) {
        self.send(ServerMessage::Error { message });
    }

    fn send(&self, message: ServerMessage) {
        let Some(frame) = connections::to_frame(&message) else {
            return;
        };
        if self.outbound.send(frame).is_err() {
            tracing::warn!("Connection {} is gone, dropping {:?}", self.connection_id, message);
        }
    }
}

impl std::fmt::Debug for ReplyHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplyHandle")
            .field("connection_id", &self.connection_id)
            .finish()
    }
}

/// Entry point for offers arriving over signaling
#[derive(Clone)]
pub struct SignalingGateway {
    requests: RequestSender,
    connections: Arc<ConnectionManager>,
}

impl SignalingGateway {
    pub fn new(requests: RequestSender, connections: Arc<ConnectionManager>) -> Self {
        Self {
            requests,
            connections,
        }
    }

    pub fn connections(&self) -> &Arc<ConnectionManager> {
        &self.connections
    }

    /// Forward an offer from `connection_id` to the room, paired with its reply handle
    pub async fn receive(&self, connection_id: Uuid, payload: String) -> Result<()> {
        tracing::debug!(
            "Queueing session request from {} ({} bytes)",
            connection_id,
            payload.len()
        );
        let Some(outbound) = self.connections.sender(connection_id).await else {
            tracing::warn!("Ignoring offer from closed connection {}", connection_id);
            return Ok(());
        };
        let reply = ReplyHandle::new(connection_id, outbound);
        self.requests.submit(SessionRequest::new(payload, reply)).await
    }
}
