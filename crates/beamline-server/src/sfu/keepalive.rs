//! Periodic keyframe requests
//!
//! Viewers only ever see what is currently flowing on the relay track, so
//! the publisher is asked for a fresh keyframe on a fixed interval. That
//! bounds how long a new viewer waits before it can decode anything.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::transport::MediaSession;

/// Send a PLI for `media_ssrc` every `period` until `stopped` flips to true
/// or its sender is dropped. The first PLI goes out one period after start.
pub(super) async fn run<S: MediaSession>(
    session: Arc<S>,
    media_ssrc: u32,
    period: Duration,
    mut stopped: watch::Receiver<bool>,
) {
    if period.is_zero() {
        tracing::error!("Keepalive for ssrc {} disabled: zero PLI interval", media_ssrc);
        return;
    }

    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::debug!(
        "Keepalive started for ssrc {} every {:?} on {}",
        media_ssrc,
        period,
        session.id()
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = session.request_keyframe(media_ssrc).await {
                    tracing::warn!("PLI send error for ssrc {}: {}", media_ssrc, e);
                }
            }
            changed = stopped.changed() => {
                if changed.is_err() || *stopped.borrow() {
                    break;
                }
            }
        }
    }

    tracing::debug!("Keepalive stopped for ssrc {}", media_ssrc);
}
