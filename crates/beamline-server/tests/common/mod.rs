//! In-memory media transport and signaling helpers shared by the integration tests
//!
//! Sessions negotiate instantly unless gathering is held. When a session
//! that asked for an inbound video transceiver commits its local description,
//! it "receives" a publisher track whose packets the test feeds directly.
//! Relay tracks fan written packets out to every attached viewer session.

#![allow(dead_code)]

use async_trait::async_trait;
use beamline_protocol::{codec, ServerMessage, SessionDescription};
use beamline_server::signaling::{ConnectionManager, ReplyHandle, SessionRequest};
use beamline_server::transport::{
    GatheringComplete, InboundTrack, InboundTrackHandler, MediaSession, MediaTransport,
    RelayTrack, TransportError,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use uuid::Uuid;

pub const PUBLISHER_SSRC: u32 = 0x1234_5678;

/// SDP marker that makes `set_remote_description` fail
pub const REJECT_MARKER: &str = "a=x-reject";

#[derive(Default)]
struct Shared {
    sessions: Mutex<Vec<Arc<LoopbackSession>>>,
    events: Mutex<Vec<String>>,
    relays_created: AtomicUsize,
    hold_gathering: AtomicBool,
    withhold_tracks: AtomicBool,
    fail_keyframes: AtomicBool,
}

impl Shared {
    fn record(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

#[derive(Clone, Default)]
pub struct LoopbackTransport {
    shared: Arc<Shared>,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep every new session's ICE gathering pending until released
    pub fn hold_gathering(&self, hold: bool) {
        self.shared.hold_gathering.store(hold, Ordering::SeqCst);
    }

    /// Never deliver an inbound track to the publisher
    pub fn withhold_tracks(&self) {
        self.shared.withhold_tracks.store(true, Ordering::SeqCst);
    }

    pub fn fail_keyframes(&self, fail: bool) {
        self.shared.fail_keyframes.store(fail, Ordering::SeqCst);
    }

    pub fn sessions(&self) -> Vec<Arc<LoopbackSession>> {
        self.shared.sessions.lock().unwrap().clone()
    }

    pub fn session(&self, index: usize) -> Arc<LoopbackSession> {
        self.sessions()[index].clone()
    }

    pub fn session_count(&self) -> usize {
        self.shared.sessions.lock().unwrap().len()
    }

    pub fn events(&self) -> Vec<String> {
        self.shared.events.lock().unwrap().clone()
    }

    pub fn relays_created(&self) -> usize {
        self.shared.relays_created.load(Ordering::SeqCst)
    }

    /// Sender feeding the publisher's inbound track. Dropping it ends the track.
    pub fn take_publisher_feed(&self) -> mpsc::UnboundedSender<Vec<u8>> {
        self.session(0)
            .feed
            .lock()
            .unwrap()
            .take()
            .expect("publisher track not delivered")
    }

    pub async fn wait_for_sessions(&self, count: usize) {
        wait_until(|| self.session_count() >= count).await;
    }
}

#[async_trait]
impl MediaTransport for LoopbackTransport {
    type Session = LoopbackSession;

    async fn new_session(&self) -> Result<Arc<LoopbackSession>, TransportError> {
        let mut sessions = self.shared.sessions.lock().unwrap();
        let (gathered, _) = watch::channel(false);
        let session = Arc::new(LoopbackSession {
            id: format!("session-{}", sessions.len()),
            shared: self.shared.clone(),
            wants_video: AtomicBool::new(false),
            handler: Mutex::new(None),
            remote: Mutex::new(None),
            local: Mutex::new(None),
            gathered,
            relay: Mutex::new(None),
            outbound: Mutex::new(None),
            feed: Mutex::new(None),
            keyframe_requests: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        });
        self.shared.record(format!("create {}", session.id));
        sessions.push(session.clone());
        Ok(session)
    }
}

pub struct LoopbackSession {
    id: String,
    shared: Arc<Shared>,
    wants_video: AtomicBool,
    handler: Mutex<Option<InboundTrackHandler<LoopbackInbound>>>,
    remote: Mutex<Option<SessionDescription>>,
    local: Mutex<Option<SessionDescription>>,
    gathered: watch::Sender<bool>,
    relay: Mutex<Option<Arc<LoopbackRelay>>>,
    outbound: Mutex<Option<mpsc::UnboundedReceiver<Vec<u8>>>>,
    feed: Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
    keyframe_requests: Mutex<Vec<(Instant, u32)>>,
    closed: AtomicBool,
}

impl LoopbackSession {
    pub fn wants_video(&self) -> bool {
        self.wants_video.load(Ordering::SeqCst)
    }

    pub fn remote_sdp(&self) -> Option<String> {
        self.remote.lock().unwrap().as_ref().map(|d| d.sdp.clone())
    }

    pub fn relay(&self) -> Option<Arc<LoopbackRelay>> {
        self.relay.lock().unwrap().clone()
    }

    /// Receiver of everything the relay track sends to this viewer
    pub fn take_outbound(&self) -> mpsc::UnboundedReceiver<Vec<u8>> {
        self.outbound
            .lock()
            .unwrap()
            .take()
            .expect("no relay attached")
    }

    pub fn keyframe_requests(&self) -> Vec<(Instant, u32)> {
        self.keyframe_requests.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn is_gathering(&self) -> bool {
        self.local.lock().unwrap().is_some() && !*self.gathered.borrow()
    }

    pub fn finish_gathering(&self) {
        self.gathered.send_replace(true);
        self.shared.record(format!("gathered {}", self.id));
    }

    fn deliver_track(&self) {
        if !self.wants_video() || self.shared.withhold_tracks.load(Ordering::SeqCst) {
            return;
        }
        let handler = self.handler.lock().unwrap();
        let Some(handler) = handler.as_ref() else {
            return;
        };

        let (tx, rx) = mpsc::unbounded_channel();
        *self.feed.lock().unwrap() = Some(tx);
        handler(Arc::new(LoopbackInbound {
            rx: tokio::sync::Mutex::new(rx),
        }));
    }
}

#[async_trait]
impl MediaSession for LoopbackSession {
    type Inbound = LoopbackInbound;
    type Relay = LoopbackRelay;

    fn id(&self) -> &str {
        &self.id
    }

    async fn add_inbound_video(&self) -> Result<(), TransportError> {
        self.wants_video.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn attach_relay(&self, relay: Arc<LoopbackRelay>) -> Result<(), TransportError> {
        let (tx, rx) = mpsc::unbounded_channel();
        relay.subscribers.lock().unwrap().push(tx);
        *self.outbound.lock().unwrap() = Some(rx);
        *self.relay.lock().unwrap() = Some(relay);
        Ok(())
    }

    fn on_inbound_track(&self, handler: InboundTrackHandler<LoopbackInbound>) {
        *self.handler.lock().unwrap() = Some(handler);
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<(), TransportError> {
        if desc.sdp.contains(REJECT_MARKER) {
            return Err(TransportError::UnsupportedDescription(
                "rejected by test".to_string(),
            ));
        }
        self.shared.record(format!("remote {}", self.id));
        *self.remote.lock().unwrap() = Some(desc);
        Ok(())
    }

    async fn create_answer(&self) -> Result<SessionDescription, TransportError> {
        let remote = self.remote.lock().unwrap().clone();
        let remote = remote.ok_or(TransportError::MissingLocalDescription)?;
        Ok(SessionDescription::answer(format!(
            "v=0\r\na=x-answer-to:{}\r\n",
            remote.sdp.trim()
        )))
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<(), TransportError> {
        *self.local.lock().unwrap() = Some(desc);
        self.shared.record(format!("local {}", self.id));

        if !self.shared.hold_gathering.load(Ordering::SeqCst) {
            self.finish_gathering();
        }
        self.deliver_track();
        Ok(())
    }

    async fn gathering_complete(&self) -> GatheringComplete {
        let mut gathered = self.gathered.subscribe();
        Box::pin(async move {
            let _ = gathered.wait_for(|done| *done).await;
        })
    }

    async fn local_description(&self) -> Option<SessionDescription> {
        let mut local = self.local.lock().unwrap().clone()?;
        if *self.gathered.borrow() {
            local
                .sdp
                .push_str("a=candidate:1 1 udp 2130706431 127.0.0.1 50000 typ host\r\n");
        }
        Some(local)
    }

    fn new_relay(&self, _inbound: &LoopbackInbound) -> Result<Arc<LoopbackRelay>, TransportError> {
        self.shared.relays_created.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(LoopbackRelay {
            subscribers: Mutex::new(Vec::new()),
        }))
    }

    async fn request_keyframe(&self, media_ssrc: u32) -> Result<(), TransportError> {
        self.keyframe_requests
            .lock()
            .unwrap()
            .push((Instant::now(), media_ssrc));
        if self.shared.fail_keyframes.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

pub struct LoopbackInbound {
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
}

#[async_trait]
impl InboundTrack for LoopbackInbound {
    type Packet = Vec<u8>;

    fn ssrc(&self) -> u32 {
        PUBLISHER_SSRC
    }

    async fn read(&self, buf: &mut [u8]) -> Result<Vec<u8>, TransportError> {
        let packet = self.rx.lock().await.recv().await.ok_or(TransportError::Closed)?;
        if packet.len() > buf.len() {
            return Err(TransportError::BufferTooSmall {
                needed: packet.len(),
                available: buf.len(),
            });
        }
        Ok(packet)
    }
}

pub struct LoopbackRelay {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<Vec<u8>>>>,
}

#[async_trait]
impl RelayTrack for LoopbackRelay {
    type Packet = Vec<u8>;

    async fn write(&self, packet: &Vec<u8>) -> Result<(), TransportError> {
        let subscribers = self.subscribers.lock().unwrap();
        if subscribers.is_empty() {
            return Err(TransportError::NoSubscribers);
        }
        for subscriber in subscribers.iter() {
            let _ = subscriber.send(packet.clone());
        }
        Ok(())
    }
}

/// A fake signaling connection registered with a connection manager
pub struct TestClient {
    pub id: Uuid,
    tx: mpsc::UnboundedSender<String>,
    rx: mpsc::UnboundedReceiver<String>,
}

impl TestClient {
    pub async fn connect(connections: &Arc<ConnectionManager>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        connections.add_connection(id, tx.clone()).await;
        Self { id, tx, rx }
    }

    pub fn request(&self, offer_sdp: &str) -> SessionRequest {
        SessionRequest::new(
            encode_offer(offer_sdp),
            ReplyHandle::new(self.id, self.tx.clone()),
        )
    }

    pub fn raw_request(&self, payload: &str) -> SessionRequest {
        SessionRequest::new(payload, ReplyHandle::new(self.id, self.tx.clone()))
    }

    pub async fn next_message(&mut self) -> ServerMessage {
        let frame = tokio::time::timeout(Duration::from_secs(5), self.rx.recv())
            .await
            .expect("timed out waiting for a signaling reply")
            .expect("connection closed");
        serde_json::from_str(&frame).expect("invalid server frame")
    }

    /// Wait for the answer and decode it
    pub async fn answer(&mut self) -> SessionDescription {
        match self.next_message().await {
            ServerMessage::Sdp { payload } => codec::decode(&payload).expect("undecodable answer"),
            other => panic!("expected an answer, got {:?}", other),
        }
    }

    pub fn has_pending_message(&mut self) -> bool {
        !self.rx.is_empty()
    }
}

pub fn encode_offer(sdp: &str) -> String {
    codec::encode(&SessionDescription::offer(sdp))
}

pub fn publisher_offer() -> &'static str {
    "v=0\r\nm=video 9 UDP/TLS/RTP/SAVPF 96\r\na=sendonly\r\n"
}

pub fn viewer_offer(name: &str) -> String {
    format!("v=0\r\nm=video 9 UDP/TLS/RTP/SAVPF 96\r\na=recvonly\r\na=x-viewer:{}\r\n", name)
}

/// Poll `condition` until it holds, failing the test after five seconds
pub async fn wait_until(condition: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
