//! Room coordinator
//!
//! Two states. The first request processed is the publisher: its session
//! receives one video track, which becomes the shared relay track. Every
//! later request is a viewer whose session sends that relay track. Requests
//! are negotiated one at a time, in the order the queue yields them.

use beamline_protocol::{codec, SdpType, SessionDescription};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use super::relay::{self, Handoff, RelayConfig};
use super::RoomStats;
use crate::error::{Error, Result};
use crate::signaling::{ReplyHandle, RequestSource, SessionRequest};
use crate::transport::{MediaSession, MediaTransport, RelayOf, SessionOf, TransportError};

/// What happens when a negotiation or the relay fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Stop the room; `Room::run` returns the error
    #[default]
    Fatal,
    /// Drop the failed session, tell its client, keep serving
    Isolate,
}

impl FromStr for ErrorPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fatal" => Ok(ErrorPolicy::Fatal),
            "isolate" => Ok(ErrorPolicy::Isolate),
            other => Err(format!("unknown error policy '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RoomConfig {
    pub error_policy: ErrorPolicy,
    /// Upper bound on ICE gathering per session; `None` waits forever
    pub ice_gathering_timeout: Option<Duration>,
    /// Upper bound on waiting for the publisher's track; `None` waits forever
    pub relay_track_timeout: Option<Duration>,
    pub relay: RelayConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomState {
    AwaitingPublisher,
    Serving,
}

pub struct Room<T: MediaTransport> {
    transport: T,
    config: RoomConfig,
    state: RoomState,
    publisher: Option<Arc<SessionOf<T>>>,
    relay_track: Option<Arc<RelayOf<T>>>,
    viewers: Vec<Arc<SessionOf<T>>>,
    stats: Arc<RoomStats>,
    failures_tx: mpsc::UnboundedSender<Error>,
    failures_rx: mpsc::UnboundedReceiver<Error>,
}

impl<T: MediaTransport> Room<T> {
    pub fn new(transport: T, config: RoomConfig) -> Self {
        let (failures_tx, failures_rx) = mpsc::unbounded_channel();
        Self {
            transport,
            config,
            state: RoomState::AwaitingPublisher,
            publisher: None,
            relay_track: None,
            viewers: Vec::new(),
            stats: Arc::new(RoomStats::default()),
            failures_tx,
            failures_rx,
        }
    }

    pub fn state(&self) -> RoomState {
        self.state
    }

    pub fn stats(&self) -> Arc<RoomStats> {
        self.stats.clone()
    }

    pub fn publisher_session(&self) -> Option<&Arc<SessionOf<T>>> {
        self.publisher.as_ref()
    }

    pub fn relay_track(&self) -> Option<&Arc<RelayOf<T>>> {
        self.relay_track.as_ref()
    }

    pub fn viewer_sessions(&self) -> &[Arc<SessionOf<T>>] {
        &self.viewers
    }

    /// Process requests until the source closes.
    ///
    /// Under [`ErrorPolicy::Fatal`] the first negotiation or relay failure
    /// ends the loop with that error.
    pub async fn run<Q: RequestSource>(mut self, mut requests: Q) -> Result<()> {
        tracing::info!("Room waiting for publisher");

        loop {
            tokio::select! {
                request = requests.next() => match request {
                    Some(request) => self.handle(request).await?,
                    None => {
                        tracing::info!("Session request queue closed, room stopping");
                        return Ok(());
                    }
                },
                Some(failure) = self.failures_rx.recv() => self.on_relay_failure(failure)?,
            }
        }
    }

    /// Negotiate one request according to the current state
    pub async fn handle(&mut self, request: SessionRequest) -> Result<()> {
        let SessionRequest { offer, reply } = request;

        let outcome = match self.state {
            RoomState::AwaitingPublisher => self.accept_publisher(&offer, &reply).await,
            RoomState::Serving => self.accept_viewer(&offer, &reply).await,
        };

        match (outcome, self.config.error_policy) {
            (Ok(()), _) => Ok(()),
            (Err(e), ErrorPolicy::Fatal) => {
                tracing::error!("Negotiation for {} failed: {}", reply.connection_id(), e);
                Err(e)
            }
            (Err(e), ErrorPolicy::Isolate) => {
                tracing::warn!("Negotiation for {} failed: {}", reply.connection_id(), e);
                reply.send_error(e.to_string());
                Ok(())
            }
        }
    }

    fn on_relay_failure(&self, failure: Error) -> Result<()> {
        match self.config.error_policy {
            ErrorPolicy::Fatal => Err(failure),
            ErrorPolicy::Isolate => {
                tracing::warn!("Publisher stream ended: {}", failure);
                Ok(())
            }
        }
    }

    async fn accept_publisher(&mut self, offer: &str, reply: &ReplyHandle) -> Result<()> {
        tracing::info!("Negotiating publisher for {}", reply.connection_id());

        let remote = decode_offer(offer)?;
        let session = self
            .transport
            .new_session()
            .await
            .map_err(Error::during("create session"))?;

        match self.negotiate_publisher(&session, remote, reply).await {
            Ok(relay) => {
                self.publisher = Some(session);
                self.relay_track = Some(relay);
                self.state = RoomState::Serving;
                self.stats.publisher_accepted();
                tracing::info!("Publisher ready, relay track available");
                Ok(())
            }
            Err(e) => {
                discard(session.as_ref()).await;
                Err(e)
            }
        }
    }

    async fn negotiate_publisher(
        &self,
        session: &Arc<SessionOf<T>>,
        remote: SessionDescription,
        reply: &ReplyHandle,
    ) -> Result<Arc<RelayOf<T>>> {
        session
            .add_inbound_video()
            .await
            .map_err(Error::during("add video transceiver"))?;

        let handoff = relay::watch_publisher(
            session,
            self.config.relay,
            self.stats.clone(),
            self.failures_tx.clone(),
        );

        let answer = self.answer(session.as_ref(), remote).await?;
        reply.send_answer(codec::encode(&answer));

        self.wait_relay(handoff).await
    }

    async fn accept_viewer(&mut self, offer: &str, reply: &ReplyHandle) -> Result<()> {
        tracing::info!("Negotiating viewer for {}", reply.connection_id());

        let relay = self.relay_track.clone().ok_or(Error::RelayUnavailable)?;
        let remote = decode_offer(offer)?;
        let session = self
            .transport
            .new_session()
            .await
            .map_err(Error::during("create session"))?;

        match self.negotiate_viewer(session.as_ref(), relay, remote).await {
            Ok(answer) => {
                reply.send_answer(codec::encode(&answer));
                self.viewers.push(session);
                self.stats.viewer_added();
                tracing::info!("Viewer {} added ({} total)", reply.connection_id(), self.viewers.len());
                Ok(())
            }
            Err(e) => {
                discard(session.as_ref()).await;
                Err(e)
            }
        }
    }

    async fn negotiate_viewer(
        &self,
        session: &SessionOf<T>,
        relay: Arc<RelayOf<T>>,
        remote: SessionDescription,
    ) -> Result<SessionDescription> {
        session
            .attach_relay(relay)
            .await
            .map_err(Error::during("attach relay track"))?;

        self.answer(session, remote).await
    }

    /// Apply the offer and produce a local answer carrying every ICE candidate
    async fn answer(
        &self,
        session: &SessionOf<T>,
        remote: SessionDescription,
    ) -> Result<SessionDescription> {
        session
            .set_remote_description(remote)
            .await
            .map_err(Error::during("set remote description"))?;

        let answer = session
            .create_answer()
            .await
            .map_err(Error::during("create answer"))?;

        // Trickle ICE is not used: only one signaling message goes back, so
        // the answer must wait for the complete candidate set.
        let gathered = session.gathering_complete().await;
        session
            .set_local_description(answer)
            .await
            .map_err(Error::during("set local description"))?;

        with_timeout(self.config.ice_gathering_timeout, "ICE gathering", gathered).await?;

        let local = session.local_description().await.ok_or(Error::Negotiation {
            stage: "read local description",
            source: TransportError::MissingLocalDescription,
        })?;

        tracing::debug!(
            "Answer for {} has {} candidates",
            session.id(),
            local.candidate_count()
        );
        Ok(local)
    }

    async fn wait_relay(&self, handoff: Handoff<RelayOf<T>>) -> Result<Arc<RelayOf<T>>> {
        match with_timeout(self.config.relay_track_timeout, "publisher track", handoff).await? {
            Ok(Ok(relay)) => Ok(relay),
            Ok(Err(e)) => Err(Error::Transport(e)),
            Err(_) => Err(Error::RelayUnavailable),
        }
    }
}

fn decode_offer(payload: &str) -> Result<SessionDescription> {
    let desc = codec::decode(payload)?;
    if desc.sdp_type != SdpType::Offer {
        return Err(Error::UnexpectedDescription(desc.sdp_type));
    }
    Ok(desc)
}

async fn with_timeout<F: std::future::Future>(
    limit: Option<Duration>,
    what: &'static str,
    fut: F,
) -> Result<F::Output> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| Error::Timeout(what)),
        None => Ok(fut.await),
    }
}

async fn discard<S: MediaSession>(session: &S) {
    if let Err(e) = session.close().await {
        tracing::warn!("Error closing session {}: {}", session.id(), e);
    }
}
