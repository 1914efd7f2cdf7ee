//! Media relay
//!
//! When the publisher's inbound track arrives, a single relay track is
//! created from it and handed to the coordinator through a one-shot slot.
//! The ingest loop is then the relay track's only writer: it copies every
//! packet from the publisher onto the relay unchanged.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};

use super::{keepalive, RoomStats};
use crate::error::{Error, Result};
use crate::transport::{InboundTrack, MediaSession, RelayTrack, TransportError};

/// Typical network MTU for RTP
pub const DEFAULT_BUFFER_SIZE: usize = 1400;

pub const DEFAULT_PLI_INTERVAL: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy)]
pub struct RelayConfig {
    /// Read buffer for one inbound packet
    pub buffer_size: usize,
    /// Keyframe request period
    pub pli_interval: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            pli_interval: DEFAULT_PLI_INTERVAL,
        }
    }
}

pub(super) type Handoff<R> = oneshot::Receiver<std::result::Result<Arc<R>, TransportError>>;

/// Register the inbound-track callback on the publisher session.
///
/// The first inbound track starts the relay; any later track is ignored.
/// The returned receiver yields the relay track exactly once. Failures of
/// the ingest loop are reported on `failures`.
pub(super) fn watch_publisher<S: MediaSession>(
    session: &Arc<S>,
    config: RelayConfig,
    stats: Arc<RoomStats>,
    failures: mpsc::UnboundedSender<Error>,
) -> Handoff<S::Relay> {
    let (tx, rx) = oneshot::channel();
    let slot = Mutex::new(Some(tx));
    let weak = Arc::downgrade(session);

    session.on_inbound_track(Box::new(move |inbound| {
        let handoff = match slot.lock() {
            Ok(mut slot) => slot.take(),
            Err(_) => None,
        };
        let Some(handoff) = handoff else {
            tracing::warn!("Ignoring additional inbound track (ssrc {})", inbound.ssrc());
            return;
        };
        let Some(session) = weak.upgrade() else {
            return;
        };

        start(session, inbound, handoff, config, stats.clone(), failures.clone());
    }));

    rx
}

fn start<S: MediaSession>(
    session: Arc<S>,
    inbound: Arc<S::Inbound>,
    handoff: oneshot::Sender<std::result::Result<Arc<S::Relay>, TransportError>>,
    config: RelayConfig,
    stats: Arc<RoomStats>,
    failures: mpsc::UnboundedSender<Error>,
) {
    let ssrc = inbound.ssrc();
    tracing::info!("Publisher track arrived on {} (ssrc {})", session.id(), ssrc);

    let relay = match session.new_relay(&inbound) {
        Ok(relay) => relay,
        Err(e) => {
            let _ = handoff.send(Err(e));
            return;
        }
    };

    let (stop_tx, stop_rx) = watch::channel(false);
    stats.set_publisher_live(true);
    tokio::spawn(keepalive::run(session, ssrc, config.pli_interval, stop_rx));

    if handoff.send(Ok(relay.clone())).is_err() {
        tracing::warn!("Coordinator stopped waiting for the relay track");
    }

    tokio::spawn(async move {
        let result = forward(inbound.as_ref(), relay.as_ref(), config.buffer_size).await;

        stats.set_publisher_live(false);
        let _ = stop_tx.send(true);

        if let Err(e) = result {
            tracing::warn!("Relay for ssrc {} stopped: {}", ssrc, e);
            let _ = failures.send(e);
        }
    });
}

/// Copy packets from `inbound` to `relay` until a read or write fails.
async fn forward<I, R>(inbound: &I, relay: &R, buffer_size: usize) -> Result<()>
where
    I: InboundTrack,
    R: RelayTrack<Packet = I::Packet>,
{
    let mut buf = vec![0u8; buffer_size];
    let mut packet_count = 0u64;

    loop {
        let packet = inbound.read(&mut buf).await?;
        packet_count += 1;

        match relay.write(&packet).await {
            // Nobody to forward to until the first viewer is negotiated
            Ok(()) | Err(TransportError::NoSubscribers) => {}
            Err(e) => return Err(e.into()),
        }

        if packet_count % 1000 == 1 {
            tracing::debug!("Relayed {} packets", packet_count);
        }
    }
}
