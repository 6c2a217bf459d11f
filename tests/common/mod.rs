//! Shared helpers for coordinator integration tests

#![allow(dead_code)]

use relaycall::peer::{IceCandidate, MockTransport};
use relaycall::{
    CandidateRecord, CoordinatorEvent, DocPath, DocumentStore, MemoryStore, SessionRole,
    SignalingConfig, SignalingCoordinator,
};
use std::sync::Arc;
use tokio::sync::mpsc;

pub type TestCoordinator = SignalingCoordinator<MemoryStore, Arc<MockTransport>>;

pub fn coordinator(backend: &MemoryStore, client: &str, transport: MockTransport) -> TestCoordinator {
    SignalingCoordinator::new(
        backend.connect(client),
        Arc::new(transport),
        SignalingConfig::default(),
    )
}

pub fn caller(backend: &MemoryStore) -> TestCoordinator {
    coordinator(backend, "caller", MockTransport::new("caller"))
}

pub fn answerer(backend: &MemoryStore) -> TestCoordinator {
    coordinator(backend, "answerer", MockTransport::new("answerer"))
}

pub fn cand(label: &str) -> IceCandidate {
    IceCandidate::new(format!("candidate:{label} 1 udp 2130706431 10.0.0.1 5000 typ host"))
}

pub fn calls_path(session_id: &str) -> DocPath {
    DocPath::new("calls", session_id)
}

/// Пишет кандидат в подколлекцию напрямую, как это сделал бы другой клиент
pub async fn inject_candidate(
    store: &MemoryStore,
    session_id: &str,
    origin: SessionRole,
    sequence: u64,
    candidate: IceCandidate,
) {
    let config = SignalingConfig::default();
    let record = CandidateRecord::new(session_id, origin, sequence, candidate);
    store
        .append_to_subcollection(
            &calls_path(session_id),
            origin.candidates_collection(&config),
            record.to_value().unwrap(),
        )
        .await
        .unwrap();
}

pub fn drain_events(rx: &mut mpsc::UnboundedReceiver<CoordinatorEvent>) -> Vec<CoordinatorEvent> {
    std::iter::from_fn(|| rx.try_recv().ok()).collect()
}
