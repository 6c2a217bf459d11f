use crate::peer::transport::{Transport, TransportError, TransportEvent, TransportEvents};
use crate::peer::types::{IceCandidate, RemoteTrack, SessionDescription};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::mpsc;

/// Вызов, записанный мок-транспортом
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    CreateOffer,
    CreateAnswer,
    SetLocal(SessionDescription),
    SetRemote(SessionDescription),
    AddCandidate(IceCandidate),
    Close,
}

/// Операции, на которых мок можно заставить упасть
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOp {
    CreateOffer,
    CreateAnswer,
    SetLocal,
    SetRemote,
    AddCandidate,
}

#[derive(Default)]
struct MockState {
    calls: Vec<TransportCall>,
    failing: HashSet<MockOp>,
    remote_set: bool,
    rejected_candidates: usize,
}

/// Transport для тестов: заданные SDP, журнал вызовов, инъекция событий
pub struct MockTransport {
    offer_sdp: String,
    answer_sdp: String,
    state: Mutex<MockState>,
    events_tx: mpsc::UnboundedSender<TransportEvent>,
    events_rx: Mutex<Option<TransportEvents>>,
}

impl MockTransport {
    pub fn new(label: &str) -> Self {
        Self::with_descriptions(format!("OFFER_{label}"), format!("ANSWER_{label}"))
    }

    pub fn with_descriptions(offer_sdp: impl Into<String>, answer_sdp: impl Into<String>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            offer_sdp: offer_sdp.into(),
            answer_sdp: answer_sdp.into(),
            state: Mutex::new(MockState::default()),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn fail_on(&self, op: MockOp) {
        self.state().failing.insert(op);
    }

    /// Как onIceCandidate
    pub fn emit_candidate(&self, candidate: IceCandidate) {
        let _ = self
            .events_tx
            .send(TransportEvent::IceCandidate(Some(candidate)));
    }

    /// Конец сбора кандидатов
    pub fn finish_gathering(&self) {
        let _ = self.events_tx.send(TransportEvent::IceCandidate(None));
    }

    pub fn emit_track(&self, track: RemoteTrack) {
        let _ = self.events_tx.send(TransportEvent::Track(track));
    }

    pub fn calls(&self) -> Vec<TransportCall> {
        self.state().calls.clone()
    }

    pub fn remote_descriptions(&self) -> Vec<SessionDescription> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                TransportCall::SetRemote(d) => Some(d),
                _ => None,
            })
            .collect()
    }

    /// Кандидаты, принятые Transport, в порядке применения
    pub fn added_candidates(&self) -> Vec<IceCandidate> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                TransportCall::AddCandidate(c) => Some(c),
                _ => None,
            })
            .collect()
    }

    /// Кандидаты, пришедшие до remote description (ошибка координатора)
    pub fn rejected_candidates(&self) -> usize {
        self.state().rejected_candidates
    }

    pub fn close_count(&self) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|c| **c == TransportCall::Close)
            .count()
    }

    fn check(&self, op: MockOp) -> Result<(), String> {
        if self.state().failing.contains(&op) {
            return Err(format!("injected {op:?} failure"));
        }
        Ok(())
    }

    fn record(&self, call: TransportCall) {
        self.state().calls.push(call);
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn create_offer(&self) -> Result<SessionDescription, TransportError> {
        self.record(TransportCall::CreateOffer);
        self.check(MockOp::CreateOffer)
            .map_err(|e| TransportError::Create("offer", e))?;
        Ok(SessionDescription::offer(self.offer_sdp.clone()))
    }

    async fn create_answer(&self) -> Result<SessionDescription, TransportError> {
        self.record(TransportCall::CreateAnswer);
        self.check(MockOp::CreateAnswer)
            .map_err(|e| TransportError::Create("answer", e))?;
        if !self.state().remote_set {
            return Err(TransportError::Create(
                "answer",
                "remote offer not set".into(),
            ));
        }
        Ok(SessionDescription::answer(self.answer_sdp.clone()))
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<(), TransportError> {
        self.record(TransportCall::SetLocal(desc));
        self.check(MockOp::SetLocal).map_err(TransportError::SetLocal)
    }

    async fn set_remote_description(
        &self,
        desc: SessionDescription,
    ) -> Result<(), TransportError> {
        self.record(TransportCall::SetRemote(desc));
        self.check(MockOp::SetRemote)
            .map_err(TransportError::SetRemote)?;
        self.state().remote_set = true;
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), TransportError> {
        self.check(MockOp::AddCandidate)
            .map_err(TransportError::AddCandidate)?;
        let mut state = self.state();
        if !state.remote_set {
            state.rejected_candidates += 1;
            return Err(TransportError::AddCandidate(
                "remote description not set".into(),
            ));
        }
        state.calls.push(TransportCall::AddCandidate(candidate));
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.record(TransportCall::Close);
        Ok(())
    }

    fn take_events(&self) -> Option<TransportEvents> {
        self.events_rx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
    }
}
