//! Media transport seam
//!
//! The room coordinator only needs a handful of peer connection primitives:
//! create a session, negotiate it, receive one inbound video track, fan a
//! relay track out to viewers, and ask the publisher for a keyframe. These
//! traits name exactly those primitives. [`rtc`] implements them on top of
//! webrtc-rs; tests provide an in-memory implementation.

pub mod rtc;

use async_trait::async_trait;
use beamline_protocol::SessionDescription;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

pub use rtc::RtcTransport;

#[derive(Error, Debug)]
pub enum TransportError {
    /// The relay track has no bound viewer yet. Expected until the first
    /// viewer is negotiated.
    #[error("No active subscribers on relay track")]
    NoSubscribers,

    #[error("Track closed")]
    Closed,

    #[error("Packet of {needed} bytes does not fit the {available} byte read buffer")]
    BufferTooSmall { needed: usize, available: usize },

    #[error("Unsupported session description type: {0}")]
    UnsupportedDescription(String),

    #[error("Local description missing after negotiation")]
    MissingLocalDescription,

    #[error("WebRTC error: {0}")]
    Rtc(#[from] webrtc::Error),
}

/// Resolves once ICE candidate gathering has finished for a session
pub type GatheringComplete = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Called when a session receives an inbound media track
pub type InboundTrackHandler<I> = Box<dyn Fn(Arc<I>) + Send + Sync>;

pub type SessionOf<T> = <T as MediaTransport>::Session;
pub type RelayOf<T> = <SessionOf<T> as MediaSession>::Relay;
pub type InboundOf<T> = <SessionOf<T> as MediaSession>::Inbound;

/// Factory for negotiated media sessions
#[async_trait]
pub trait MediaTransport: Send + Sync + 'static {
    type Session: MediaSession;

    /// Create a fresh session using the configured ICE servers
    async fn new_session(&self) -> Result<Arc<Self::Session>, TransportError>;
}

/// One peer connection
#[async_trait]
pub trait MediaSession: Send + Sync + 'static {
    type Inbound: InboundTrack;
    type Relay: RelayTrack<Packet = <Self::Inbound as InboundTrack>::Packet>;

    /// Identifier used in logs
    fn id(&self) -> &str;

    /// Request one receive-only video transceiver
    async fn add_inbound_video(&self) -> Result<(), TransportError>;

    /// Use `relay` as this session's outbound media source
    async fn attach_relay(&self, relay: Arc<Self::Relay>) -> Result<(), TransportError>;

    /// Register the inbound-track callback. Must happen before the remote
    /// description is applied.
    fn on_inbound_track(&self, handler: InboundTrackHandler<Self::Inbound>);

    async fn set_remote_description(&self, desc: SessionDescription)
        -> Result<(), TransportError>;

    async fn create_answer(&self) -> Result<SessionDescription, TransportError>;

    async fn set_local_description(&self, desc: SessionDescription)
        -> Result<(), TransportError>;

    /// Obtain the gathering signal. Call before `set_local_description`,
    /// which is what starts gathering.
    async fn gathering_complete(&self) -> GatheringComplete;

    /// Current local description, including every gathered candidate
    async fn local_description(&self) -> Option<SessionDescription>;

    /// Create the shared outbound track that mirrors `inbound`
    fn new_relay(&self, inbound: &Self::Inbound) -> Result<Arc<Self::Relay>, TransportError>;

    /// Send a Picture Loss Indication for `media_ssrc`
    async fn request_keyframe(&self, media_ssrc: u32) -> Result<(), TransportError>;

    async fn close(&self) -> Result<(), TransportError>;
}

/// Media arriving from the publisher
#[async_trait]
pub trait InboundTrack: Send + Sync + 'static {
    /// One received media packet, handed to the relay without re-encoding
    type Packet: Send + Sync + 'static;

    fn ssrc(&self) -> u32;

    /// Receive the next packet, using `buf` as the read buffer
    async fn read(&self, buf: &mut [u8]) -> Result<Self::Packet, TransportError>;
}

/// The single outbound track every viewer is fed from
#[async_trait]
pub trait RelayTrack: Send + Sync + 'static {
    type Packet: Send + Sync + 'static;

    /// Write one packet unchanged to every bound viewer. Fails with
    /// [`TransportError::NoSubscribers`] when no viewer is bound.
    async fn write(&self, packet: &Self::Packet) -> Result<(), TransportError>;
}
