use beamline_protocol::ServerMessage;
use std::collections::HashMap;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

/// Open signaling connections and their outbound message channels
pub struct ConnectionManager {
    /// Map from connection ID to message sender channel
    senders: RwLock<HashMap<Uuid, mpsc::UnboundedSender<String>>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self {
            senders: RwLock::new(HashMap::new()),
        }
    }

    pub async fn add_connection(&self, connection_id: Uuid, sender: mpsc::UnboundedSender<String>) {
        self.senders.write().await.insert(connection_id, sender);
        tracing::info!("connected: {}", connection_id);
    }

    pub async fn remove_connection(&self, connection_id: Uuid) {
        if self.senders.write().await.remove(&connection_id).is_some() {
            tracing::info!("disconnected: {}", connection_id);
        }
    }

    /// Queue a message for one connection. Returns false if the connection is gone.
    pub async fn send_to_connection(&self, connection_id: Uuid, message: &ServerMessage) -> bool {
        let Some(json) = to_frame(message) else {
            return false;
        };

        let senders = self.senders.read().await;

        match senders.get(&connection_id) {
            Some(sender) => match sender.send(json) {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!("Failed to send message to {}: {}", connection_id, e);
                    false
                }
            },
            None => {
                tracing::warn!("Connection {} is gone, dropping {:?}", connection_id, message);
                false
            }
        }
    }

    /// Outbound channel of one connection, if it is still open
    pub async fn sender(&self, connection_id: Uuid) -> Option<mpsc::UnboundedSender<String>> {
        self.senders.read().await.get(&connection_id).cloned()
    }

    pub async fn connection_count(&self) -> usize {
        self.senders.read().await.len()
    }
}

/// Serialize a server message into one text frame
pub(crate) fn to_frame(message: &ServerMessage) -> Option<String> {
    match serde_json::to_string(message) {
        Ok(json) => Some(json),
        Err(e) => {
            tracing::error!("Failed to serialize message: {}", e);
            None
        }
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}
