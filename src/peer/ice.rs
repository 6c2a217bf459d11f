use crate::peer::types::{IceCandidate, ServerConfig};
use crate::utils::normalized_urls;
use tracing::{info, warn};
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::ice_transport::ice_server::RTCIceServer;

impl From<IceCandidate> for RTCIceCandidateInit {
    fn from(c: IceCandidate) -> Self {
        RTCIceCandidateInit {
            candidate: c.candidate,
            sdp_mid: c.sdp_mid,
            sdp_mline_index: c.sdp_mline_index,
            username_fragment: c.username_fragment,
        }
    }
}

impl From<RTCIceCandidateInit> for IceCandidate {
    fn from(init: RTCIceCandidateInit) -> Self {
        IceCandidate {
            candidate: init.candidate,
            sdp_mid: init.sdp_mid,
            sdp_mline_index: init.sdp_mline_index,
            username_fragment: init.username_fragment,
        }
    }
}

/// Конфигурация серверов в формате webrtc
pub fn ice_servers(servers: &[ServerConfig]) -> Vec<RTCIceServer> {
    servers
        .iter()
        .map(|config| RTCIceServer {
            urls: normalized_urls(config),
            username: config.username.clone().unwrap_or_default(),
            credential: config.credential.clone().unwrap_or_default(),
        })
        .collect()
}

/// Счётчики опубликованных локальных кандидатов по типам
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CandidateStats {
    pub host: usize,
    pub srflx: usize,
    pub relay: usize,
    pub other: usize,
}

impl CandidateStats {
    pub fn record(&mut self, candidate: &IceCandidate) {
        if candidate.candidate.contains("typ host") {
            self.host += 1;
        } else if candidate.candidate.contains("typ srflx") {
            self.srflx += 1;
        } else if candidate.candidate.contains("typ relay") {
            self.relay += 1;
        } else {
            self.other += 1;
        }
    }

    pub fn total(&self) -> usize {
        self.host + self.srflx + self.relay + self.other
    }

    pub fn log_summary(&self, session_id: &str) {
        info!(
            session_id,
            host = self.host,
            srflx = self.srflx,
            relay = self.relay,
            "candidate gathering complete"
        );
        if self.total() == self.other {
            warn!(session_id, "no usable candidates published, peers may not connect");
        }
    }
}
