use crate::config::SignalingConfig;
use crate::peer::ice::ice_servers;
use crate::peer::transport::{Transport, TransportError, TransportEvent, TransportEvents};
use crate::peer::types::{IceCandidate, MediaKind, RemoteTrack, SdpType, SessionDescription};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_candidate::RTCIceCandidate;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::policy::bundle_policy::RTCBundlePolicy;
use webrtc::peer_connection::policy::rtcp_mux_policy::RTCRtcpMuxPolicy;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::rtp_transceiver::RTCRtpTransceiver;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_remote::TrackRemote;

/// Transport поверх `webrtc::RTCPeerConnection`
pub struct WebRtcTransport {
    pc: Arc<RTCPeerConnection>,
    events_rx: Mutex<Option<TransportEvents>>,
}

fn setup_err(e: webrtc::Error) -> TransportError {
    TransportError::Setup(e.to_string())
}

/// Создает конфигурацию для peer connection
fn rtc_config(config: &SignalingConfig) -> RTCConfiguration {
    RTCConfiguration {
        ice_servers: ice_servers(&config.ice_servers),
        ice_candidate_pool_size: config.ice_candidate_pool_size,
        bundle_policy: RTCBundlePolicy::MaxBundle,
        rtcp_mux_policy: RTCRtcpMuxPolicy::Require,
        ..Default::default()
    }
}

fn to_rtc(desc: SessionDescription) -> Result<RTCSessionDescription, webrtc::Error> {
    match desc.kind {
        SdpType::Offer => RTCSessionDescription::offer(desc.sdp),
        SdpType::Answer => RTCSessionDescription::answer(desc.sdp),
    }
}

fn from_rtc(desc: RTCSessionDescription) -> Result<SessionDescription, String> {
    match desc.sdp_type {
        RTCSdpType::Offer => Ok(SessionDescription::offer(desc.sdp)),
        RTCSdpType::Answer => Ok(SessionDescription::answer(desc.sdp)),
        other => Err(format!("unexpected sdp type {other}")),
    }
}

fn media_kind(kind: RTPCodecType) -> MediaKind {
    match kind {
        RTPCodecType::Audio => MediaKind::Audio,
        RTPCodecType::Video => MediaKind::Video,
        _ => MediaKind::Unknown,
    }
}

impl WebRtcTransport {
    /// создаём Peer с аудио/видео кодеками и подписываемся на события
    pub async fn new(config: &SignalingConfig) -> Result<Self, TransportError> {
        let mut media = MediaEngine::default();
        media.register_default_codecs().map_err(setup_err)?;
        let registry = register_default_interceptors(Registry::new(), &mut media).map_err(setup_err)?;
        let api = APIBuilder::new()
            .with_media_engine(media)
            .with_interceptor_registry(registry)
            .build();

        let pc = Arc::new(
            api.new_peer_connection(rtc_config(config))
                .await
                .map_err(setup_err)?,
        );
        let (tx, rx) = mpsc::unbounded_channel();

        // Обработчик для локальных кандидатов
        let cand_tx = tx.clone();
        pc.on_ice_candidate(Box::new(move |cand: Option<RTCIceCandidate>| {
            let tx = cand_tx.clone();
            Box::pin(async move {
                match cand {
                    Some(c) => match c.to_json() {
                        Ok(init) => {
                            let _ = tx.send(TransportEvent::IceCandidate(Some(IceCandidate::from(init))));
                        }
                        Err(e) => warn!(error = %e, "failed to serialize local candidate"),
                    },
                    None => {
                        // cand == None означает конец сбора
                        debug!("ICE candidate gathering completed (null candidate received)");
                        let _ = tx.send(TransportEvent::IceCandidate(None));
                    }
                }
            })
        }));

        pc.on_ice_gathering_state_change(Box::new(move |state| {
            debug!(?state, "ICE gathering state changed");
            Box::pin(async {})
        }));

        pc.on_peer_connection_state_change(Box::new(move |st: RTCPeerConnectionState| {
            info!(state = ?st, "peer connection state changed");
            Box::pin(async {})
        }));

        let track_tx = tx;
        pc.on_track(Box::new(
            move |track: Arc<TrackRemote>,
                  _receiver: Arc<RTCRtpReceiver>,
                  _transceiver: Arc<RTCRtpTransceiver>| {
                let remote = RemoteTrack {
                    id: track.id(),
                    stream_id: track.stream_id(),
                    kind: media_kind(track.kind()),
                };
                let _ = track_tx.send(TransportEvent::Track(remote));
                Box::pin(async {})
            },
        ));

        Ok(Self {
            pc,
            events_rx: Mutex::new(Some(rx)),
        })
    }

    /// Добавляет локальный трек (камера/микрофон) до создания offer/answer
    pub async fn add_local_track(
        &self,
        track: Arc<dyn TrackLocal + Send + Sync>,
    ) -> Result<(), TransportError> {
        info!(track_id = %track.id(), "local track added");
        self.pc.add_track(track).await.map_err(setup_err)?;
        Ok(())
    }

    pub fn peer_connection(&self) -> &Arc<RTCPeerConnection> {
        &self.pc
    }
}

#[async_trait]
impl Transport for WebRtcTransport {
    async fn create_offer(&self) -> Result<SessionDescription, TransportError> {
        let offer = self
            .pc
            .create_offer(None)
            .await
            .map_err(|e| TransportError::Create("offer", e.to_string()))?;
        from_rtc(offer).map_err(|e| TransportError::Create("offer", e))
    }

    async fn create_answer(&self) -> Result<SessionDescription, TransportError> {
        let answer = self
            .pc
            .create_answer(None)
            .await
            .map_err(|e| TransportError::Create("answer", e.to_string()))?;
        from_rtc(answer).map_err(|e| TransportError::Create("answer", e))
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<(), TransportError> {
        let desc = to_rtc(desc).map_err(|e| TransportError::SetLocal(e.to_string()))?;
        self.pc
            .set_local_description(desc)
            .await
            .map_err(|e| TransportError::SetLocal(e.to_string()))
    }

    async fn set_remote_description(
        &self,
        desc: SessionDescription,
    ) -> Result<(), TransportError> {
        let desc = to_rtc(desc).map_err(|e| TransportError::SetRemote(e.to_string()))?;
        self.pc
            .set_remote_description(desc)
            .await
            .map_err(|e| TransportError::SetRemote(e.to_string()))
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), TransportError> {
        self.pc
            .add_ice_candidate(candidate.into())
            .await
            .map_err(|e| TransportError::AddCandidate(e.to_string()))
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.pc
            .close()
            .await
            .map_err(|e| TransportError::Setup(e.to_string()))
    }

    fn take_events(&self) -> Option<TransportEvents> {
        self.events_rx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptions_convert_both_ways() {
        let rtc = to_rtc(SessionDescription::offer("v=0\r\n")).unwrap();
        assert_eq!(rtc.sdp_type, RTCSdpType::Offer);
        assert_eq!(from_rtc(rtc).unwrap(), SessionDescription::offer("v=0\r\n"));
    }

    #[test]
    fn rtc_config_follows_signaling_config() {
        let cfg = rtc_config(&SignalingConfig::default());
        assert_eq!(cfg.ice_candidate_pool_size, 10);
        assert_eq!(cfg.ice_servers.len(), 1);
        assert_eq!(cfg.ice_servers[0].urls.len(), 2);
        assert_eq!(cfg.bundle_policy, RTCBundlePolicy::MaxBundle);
    }

    #[tokio::test]
    async fn webrtc_transport_creates_offer_and_emits_candidates() {
        let transport = WebRtcTransport::new(&SignalingConfig {
            ice_servers: Vec::new(),
            ..Default::default()
        })
        .await
        .unwrap();
        let mut events = transport.take_events().unwrap();
        assert!(transport.take_events().is_none());

        // без треков и data channel offer всё равно валиден
        let _ = transport
            .peer_connection()
            .create_data_channel("probe", None)
            .await
            .unwrap();
        let offer = transport.create_offer().await.unwrap();
        assert_eq!(offer.kind, SdpType::Offer);
        assert!(offer.sdp.starts_with("v=0"));
        transport.set_local_description(offer).await.unwrap();

        let first = tokio::time::timeout(std::time::Duration::from_secs(10), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(first, TransportEvent::IceCandidate(_)));
        transport.close().await.unwrap();
    }
}
