//! webrtc-rs implementation of the media transport

use async_trait::async_trait;
use beamline_protocol::{SdpType, SessionDescription};
use std::sync::Arc;
use uuid::Uuid;

use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::setting_engine::SettingEngine;
use webrtc::api::APIBuilder;
use webrtc::api::API;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp::packet::Packet;
use webrtc::rtcp::payload_feedbacks::picture_loss_indication::PictureLossIndication;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::rtp_transceiver::RTCRtpTransceiverInit;
use webrtc::track::track_local::track_local_static_rtp::TrackLocalStaticRTP;
use webrtc::track::track_local::{TrackLocal, TrackLocalWriter};
use webrtc::track::track_remote::TrackRemote;

use super::{
    GatheringComplete, InboundTrack, InboundTrackHandler, MediaSession, MediaTransport,
    RelayTrack, TransportError,
};

/// Builds peer connections from one shared webrtc-rs `API`
pub struct RtcTransport {
    api: Arc<API>,
    ice_servers: Vec<RTCIceServer>,
}

impl RtcTransport {
    pub fn new(stun_servers: &[String]) -> Result<Self, TransportError> {
        // Browsers offer whichever of the default codecs they support; the
        // relay track reuses the publisher's negotiated codec as-is.
        let mut media_engine = MediaEngine::default();
        media_engine.register_default_codecs()?;

        let mut registry = Registry::new();
        registry = register_default_interceptors(registry, &mut media_engine)?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .with_setting_engine(SettingEngine::default())
            .build();

        let ice_servers = stun_servers
            .iter()
            .map(|url| RTCIceServer {
                urls: vec![url.clone()],
                ..Default::default()
            })
            .collect();

        Ok(Self {
            api: Arc::new(api),
            ice_servers,
        })
    }
}

#[async_trait]
impl MediaTransport for RtcTransport {
    type Session = RtcSession;

    async fn new_session(&self) -> Result<Arc<RtcSession>, TransportError> {
        let config = RTCConfiguration {
            ice_servers: self.ice_servers.clone(),
            ..Default::default()
        };

        let pc = self.api.new_peer_connection(config).await?;
        let session = RtcSession {
            id: Uuid::new_v4().to_string(),
            pc: Arc::new(pc),
        };

        tracing::debug!("Created peer connection {}", session.id);
        Ok(Arc::new(session))
    }
}

pub struct RtcSession {
    id: String,
    pc: Arc<RTCPeerConnection>,
}

fn to_rtc(desc: SessionDescription) -> Result<RTCSessionDescription, TransportError> {
    let rtc = match desc.sdp_type {
        SdpType::Offer => RTCSessionDescription::offer(desc.sdp)?,
        SdpType::Answer => RTCSessionDescription::answer(desc.sdp)?,
        SdpType::Pranswer => RTCSessionDescription::pranswer(desc.sdp)?,
        SdpType::Rollback => {
            return Err(TransportError::UnsupportedDescription(desc.sdp_type.to_string()));
        }
    };
    Ok(rtc)
}

fn from_rtc(desc: RTCSessionDescription) -> Result<SessionDescription, TransportError> {
    let sdp_type = match desc.sdp_type {
        RTCSdpType::Offer => SdpType::Offer,
        RTCSdpType::Answer => SdpType::Answer,
        RTCSdpType::Pranswer => SdpType::Pranswer,
        RTCSdpType::Rollback => SdpType::Rollback,
        RTCSdpType::Unspecified => {
            return Err(TransportError::UnsupportedDescription(desc.sdp_type.to_string()));
        }
    };
    Ok(SessionDescription {
        sdp_type,
        sdp: desc.sdp,
    })
}

#[async_trait]
impl MediaSession for RtcSession {
    type Inbound = RtcInboundTrack;
    type Relay = RtcRelayTrack;

    fn id(&self) -> &str {
        &self.id
    }

    async fn add_inbound_video(&self) -> Result<(), TransportError> {
        self.pc
            .add_transceiver_from_kind(
                RTPCodecType::Video,
                Some(RTCRtpTransceiverInit {
                    direction: RTCRtpTransceiverDirection::Recvonly,
                    send_encodings: vec![],
                }),
            )
            .await?;
        Ok(())
    }

    async fn attach_relay(&self, relay: Arc<RtcRelayTrack>) -> Result<(), TransportError> {
        let track: Arc<dyn TrackLocal + Send + Sync> = relay.track.clone();
        let rtp_sender = self.pc.add_track(track).await?;

        // Incoming RTCP must be drained so the interceptors (NACK, reports) run
        let id = self.id.clone();
        tokio::spawn(async move {
            let mut rtcp_buf = vec![0u8; 1500];
            while rtp_sender.read(&mut rtcp_buf).await.is_ok() {}
            tracing::debug!("RTCP reader for {} finished", id);
        });

        Ok(())
    }

    fn on_inbound_track(&self, handler: InboundTrackHandler<RtcInboundTrack>) {
        self.pc.on_track(Box::new(move |track, _receiver, _transceiver| {
            handler(Arc::new(RtcInboundTrack { track }));
            Box::pin(async {})
        }));
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<(), TransportError> {
        self.pc.set_remote_description(to_rtc(desc)?).await?;
        Ok(())
    }

    async fn create_answer(&self) -> Result<SessionDescription, TransportError> {
        from_rtc(self.pc.create_answer(None).await?)
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<(), TransportError> {
        self.pc.set_local_description(to_rtc(desc)?).await?;
        Ok(())
    }

    async fn gathering_complete(&self) -> GatheringComplete {
        let mut done_rx = self.pc.gathering_complete_promise().await;
        Box::pin(async move {
            let _ = done_rx.recv().await;
        })
    }

    async fn local_description(&self) -> Option<SessionDescription> {
        let desc = self.pc.local_description().await?;
        from_rtc(desc).ok()
    }

    fn new_relay(&self, inbound: &RtcInboundTrack) -> Result<Arc<RtcRelayTrack>, TransportError> {
        let codec = inbound.track.codec();
        tracing::info!(
            "Creating relay track for {} (ssrc {}, payload type {})",
            codec.capability.mime_type,
            inbound.track.ssrc(),
            inbound.track.payload_type()
        );

        let track = TrackLocalStaticRTP::new(
            codec.capability,
            "video".to_owned(),
            "beamline".to_owned(),
        );
        Ok(Arc::new(RtcRelayTrack {
            track: Arc::new(track),
        }))
    }

    async fn request_keyframe(&self, media_ssrc: u32) -> Result<(), TransportError> {
        let pli = PictureLossIndication {
            sender_ssrc: 0,
            media_ssrc,
        };
        self.pc.write_rtcp(&[Box::new(pli)]).await?;
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.pc.close().await?;
        Ok(())
    }
}

pub struct RtcInboundTrack {
    track: Arc<TrackRemote>,
}

#[async_trait]
impl InboundTrack for RtcInboundTrack {
    type Packet = Packet;

    fn ssrc(&self) -> u32 {
        self.track.ssrc()
    }

    async fn read(&self, buf: &mut [u8]) -> Result<Packet, TransportError> {
        let (packet, _attributes) = self.track.read(buf).await?;
        Ok(packet)
    }
}

pub struct RtcRelayTrack {
    track: Arc<TrackLocalStaticRTP>,
}

#[async_trait]
impl RelayTrack for RtcRelayTrack {
    type Packet = Packet;

    async fn write(&self, packet: &Packet) -> Result<(), TransportError> {
        // Byte count summed over bindings; zero means no viewer is bound yet
        match self.track.write_rtp(packet).await? {
            0 => Err(TransportError::NoSubscribers),
            _ => Ok(()),
        }
    }
}
