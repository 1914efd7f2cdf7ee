//! Session request queue
//!
//! A bounded FIFO between the signaling gateway and the room coordinator.
//! The coordinator is its only consumer, so every negotiation runs strictly
//! in arrival order.

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::ReplyHandle;
use crate::error::{Error, Result};

pub const DEFAULT_CAPACITY: usize = 2;

/// An encoded offer together with the connection that sent it
#[derive(Debug)]
pub struct SessionRequest {
    pub offer: String,
    pub reply: ReplyHandle,
}

impl SessionRequest {
    pub fn new(offer: impl Into<String>, reply: ReplyHandle) -> Self {
        Self {
            offer: offer.into(),
            reply,
        }
    }
}

/// Ordered source of session requests consumed by the room
#[async_trait]
pub trait RequestSource: Send {
    /// Next request, or `None` once no producer is left
    async fn next(&mut self) -> Option<SessionRequest>;
}

#[derive(Clone)]
pub struct RequestSender {
    tx: mpsc::Sender<SessionRequest>,
}

impl RequestSender {
    /// Enqueue a request, waiting while the queue is full
    pub async fn submit(&self, request: SessionRequest) -> Result<()> {
        self.tx.send(request).await.map_err(|_| Error::QueueClosed)
    }
}

pub struct RequestReceiver {
    rx: mpsc::Receiver<SessionRequest>,
}

#[async_trait]
impl RequestSource for RequestReceiver {
    async fn next(&mut self) -> Option<SessionRequest> {
        self.rx.recv().await
    }
}

/// Create a queue holding at most `capacity` pending requests
pub fn request_queue(capacity: usize) -> (RequestSender, RequestReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (RequestSender { tx }, RequestReceiver { rx })
}
