use crate::config::{default_log_filter, LOGGING_ENABLED};
use crate::peer::types::IceCandidate;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Подключает tracing-subscriber. `RUST_LOG` имеет приоритет над `filter`.
/// Повторная инициализация молча игнорируется.
pub fn init(filter: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter.map(str::to_string).unwrap_or_else(default_log_filter)))
        .unwrap_or_else(|_| EnvFilter::new(default_log_filter()));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(LOGGING_ENABLED)
        .try_init();
}

/// Печать ICE-candidate при появлении (Trickle-ICE)
pub fn dump_candidate(label: &str, cand: &IceCandidate) {
    debug!(
        "Trickle {label}: candidate={} sdp_mid={:?} sdp_mline_index={:?} username_fragment={:?}",
        cand.candidate, cand.sdp_mid, cand.sdp_mline_index, cand.username_fragment
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        init(Some("debug"));
        init(None);
        dump_candidate("TEST", &IceCandidate::new("candidate:1 1 udp 1 10.0.0.1 9 typ host"));
    }
}
