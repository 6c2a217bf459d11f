use crate::config::SignalingConfig;
use crate::error::SignalingError;
use crate::logger::dump_candidate;
use crate::peer::ice::CandidateStats;
use crate::peer::types::{IceCandidate, SessionDescription};
use crate::peer::{Transport, TransportEvent, TransportEvents};
use crate::session::{read_description, CandidateRecord, SessionId, SessionRole};
use crate::signaling::buffer::{Admission, CandidateBuffer};
use crate::signaling::events::CoordinatorEvent;
use crate::signaling::SessionState;
use crate::store::{DocPath, Document, DocumentStore, StoreError, Subscription};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Входящее сообщение для цикла событий координатора
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Снимок документа сессии (подписка звонящего)
    SessionDocument(Document),
    /// Новый элемент подколлекции кандидатов второй стороны
    RemoteCandidate(Value),
    Transport(TransportEvent),
}

/// Координатор сигналинга для одной сессии.
///
/// Владеет своим Transport и подписками на хранилище. Все события
/// (уведомления хранилища, onIceCandidate, onTrack) приходят сообщениями в
/// один цикл и обрабатываются по одному до конца, поэтому состояние не
/// требует блокировок.
pub struct SignalingCoordinator<S: DocumentStore, T: Transport> {
    store: S,
    transport: T,
    config: SignalingConfig,
    state: SessionState,
    role: Option<SessionRole>,
    session_id: Option<SessionId>,
    buffer: CandidateBuffer,
    local_sequence: u64,
    gathering_complete: bool,
    local_stats: CandidateStats,
    doc_sub: Option<Subscription<Document>>,
    candidates_sub: Option<Subscription<Value>>,
    transport_events: Option<TransportEvents>,
    events_tx: Option<mpsc::UnboundedSender<CoordinatorEvent>>,
    torn_down: bool,
}

impl<S: DocumentStore, T: Transport> SignalingCoordinator<S, T> {
    pub fn new(store: S, transport: T, config: SignalingConfig) -> Self {
        let transport_events = transport.take_events();
        if transport_events.is_none() {
            warn!("transport events already taken, local candidates will not be published");
        }
        Self {
            store,
            transport,
            config,
            state: SessionState::Idle,
            role: None,
            session_id: None,
            buffer: CandidateBuffer::new(),
            local_sequence: 0,
            gathering_complete: false,
            local_stats: CandidateStats::default(),
            doc_sub: None,
            candidates_sub: None,
            transport_events,
            events_tx: None,
            torn_down: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn role(&self) -> Option<SessionRole> {
        self.role
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Сколько удалённых кандидатов ждут remote description
    pub fn pending_remote_candidates(&self) -> usize {
        self.buffer.pending_len()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Поток событий для UI. Отдаётся один раз; события до вызова не копятся.
    pub fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<CoordinatorEvent>> {
        if self.events_tx.is_some() {
            return None;
        }
        let (tx, rx) = mpsc::unbounded_channel();
        self.events_tx = Some(tx);
        Some(rx)
    }

    /// ========== SETUP ==========

    /// Сторона A: создаёт сессию, публикует offer и ждёт answer.
    /// Возвращает id сессии для передачи второй стороне.
    pub async fn start_as_caller(&mut self) -> Result<SessionId, SignalingError> {
        self.ensure_idle("start_as_caller")?;
        self.role = Some(SessionRole::Caller);
        let result = self.publish_offer().await;
        self.finish_setup(result)
    }

    async fn publish_offer(&mut self) -> Result<SessionId, SignalingError> {
        let calls = self.config.calls_collection.clone();
        let id = self.store.create_document(&calls).await?;
        self.session_id = Some(id.clone());
        info!(session_id = %id, "session document created");

        let offer = self.transport.create_offer().await?;
        self.transport.set_local_description(offer.clone()).await?;
        self.set_state(SessionState::LocalDescriptionCreated);

        let value = serde_json::to_value(&offer).map_err(StoreError::from)?;
        self.store
            .set_field(&calls, &id, SessionRole::Caller.description_field(), value)
            .await?;
        self.set_state(SessionState::Published);

        let path = DocPath::new(calls, id.as_str());
        self.doc_sub = Some(self.store.subscribe_document(&path).await?);
        let remote = SessionRole::Answerer.candidates_collection(&self.config).to_string();
        self.candidates_sub = Some(self.store.subscribe_collection(&path, &remote).await?);
        self.set_state(SessionState::AwaitingRemote);
        Ok(id)
    }

    /// Сторона B: читает offer, отвечает и начинает обмен кандидатами
    pub async fn join_as_answerer(&mut self, session_id: &str) -> Result<(), SignalingError> {
        self.ensure_idle("join_as_answerer")?;
        if session_id.trim().is_empty() {
            return Err(SignalingError::InvalidSessionId);
        }
        self.role = Some(SessionRole::Answerer);
        self.session_id = Some(session_id.to_string());
        let result = self.accept_offer(session_id).await;
        self.finish_setup(result)
    }

    async fn accept_offer(&mut self, session_id: &str) -> Result<(), SignalingError> {
        let calls = self.config.calls_collection.clone();
        let doc = self
            .store
            .get_document(&calls, session_id)
            .await?
            .ok_or_else(|| SignalingError::SessionNotFound(session_id.to_string()))?;
        let offer = read_description(&doc, SessionRole::Caller)?
            .ok_or_else(|| SignalingError::SessionNotFound(session_id.to_string()))?;
        if read_description(&doc, SessionRole::Answerer)?.is_some() {
            return Err(SignalingError::Conflict(session_id.to_string()));
        }

        self.apply_remote_description(offer).await?;

        let answer = self.transport.create_answer().await?;
        self.transport.set_local_description(answer.clone()).await?;

        // read-modify-write: второй отвечающий мог успеть раньше
        let current = self.store.get_document(&calls, session_id).await?;
        if let Some(current) = current {
            if read_description(&current, SessionRole::Answerer)?.is_some() {
                return Err(SignalingError::Conflict(session_id.to_string()));
            }
        }
        let value = serde_json::to_value(&answer).map_err(StoreError::from)?;
        self.store
            .set_field(&calls, session_id, SessionRole::Answerer.description_field(), value)
            .await?;
        info!(session_id, "answer published");

        let path = DocPath::new(calls, session_id);
        let remote = SessionRole::Caller.candidates_collection(&self.config).to_string();
        self.candidates_sub = Some(self.store.subscribe_collection(&path, &remote).await?);
        self.set_state(SessionState::CandidatesFlowing);
        self.maybe_negotiated();
        Ok(())
    }

    fn ensure_idle(&self, op: &'static str) -> Result<(), SignalingError> {
        if self.state != SessionState::Idle || self.role.is_some() || self.torn_down {
            return Err(SignalingError::InvalidState {
                op,
                state: self.state,
            });
        }
        Ok(())
    }

    fn finish_setup<R>(&mut self, result: Result<R, SignalingError>) -> Result<R, SignalingError> {
        if let Err(e) = &result {
            self.fail(e.clone());
        }
        result
    }

    /// ========== EVENT LOOP ==========

    /// Ждёт следующее сообщение от хранилища или Transport.
    /// `None`, когда сессия не начата, завершена или все источники закрыты.
    pub async fn next_inbound(&mut self) -> Option<Inbound> {
        if !self.accepts_inbound() {
            return None;
        }
        tokio::select! {
            biased;
            Some(doc) = recv_sub(self.doc_sub.as_mut()) => Some(Inbound::SessionDocument(doc)),
            Some(item) = recv_sub(self.candidates_sub.as_mut()) => Some(Inbound::RemoteCandidate(item)),
            Some(ev) = recv_events(self.transport_events.as_mut()) => Some(Inbound::Transport(ev)),
            else => None,
        }
    }

    /// Уже доставленное сообщение, без ожидания
    pub fn try_next_inbound(&mut self) -> Option<Inbound> {
        if !self.accepts_inbound() {
            return None;
        }
        if let Some(doc) = self.doc_sub.as_mut().and_then(|s| s.try_recv()) {
            return Some(Inbound::SessionDocument(doc));
        }
        if let Some(item) = self.candidates_sub.as_mut().and_then(|s| s.try_recv()) {
            return Some(Inbound::RemoteCandidate(item));
        }
        self.transport_events
            .as_mut()
            .and_then(|rx| rx.try_recv().ok())
            .map(Inbound::Transport)
    }

    /// Обрабатывает всё, что уже пришло. Возвращает число сообщений.
    pub async fn drain_pending(&mut self) -> Result<usize, SignalingError> {
        let mut handled = 0;
        while let Some(inbound) = self.try_next_inbound() {
            self.handle(inbound).await?;
            handled += 1;
        }
        Ok(handled)
    }

    /// Цикл событий до закрытия сессии или фатальной ошибки
    pub async fn run(&mut self) -> Result<(), SignalingError> {
        while let Some(inbound) = self.next_inbound().await {
            self.handle(inbound).await?;
        }
        Ok(())
    }

    /// Обрабатывает одно сообщение до конца
    pub async fn handle(&mut self, inbound: Inbound) -> Result<(), SignalingError> {
        if self.state.is_terminal() {
            debug!(state = ?self.state, "session finished, dropping inbound message");
            return Ok(());
        }
        match inbound {
            Inbound::SessionDocument(doc) => self.on_session_document(doc).await,
            Inbound::RemoteCandidate(item) => {
                self.on_remote_candidate_item(item).await;
                Ok(())
            }
            Inbound::Transport(TransportEvent::IceCandidate(Some(candidate))) => {
                self.on_local_ice_candidate(candidate).await;
                Ok(())
            }
            Inbound::Transport(TransportEvent::IceCandidate(None)) => {
                self.on_gathering_complete();
                Ok(())
            }
            Inbound::Transport(TransportEvent::Track(track)) => {
                info!(track_id = %track.id, kind = ?track.kind, "remote track added");
                self.emit(CoordinatorEvent::RemoteTrack(track));
                Ok(())
            }
        }
    }

    fn accepts_inbound(&self) -> bool {
        self.role.is_some() && self.session_id.is_some() && !self.state.is_terminal()
    }

    /// ========== HANDLERS ==========

    async fn on_session_document(&mut self, doc: Document) -> Result<(), SignalingError> {
        if self.role != Some(SessionRole::Caller) {
            return Ok(());
        }
        let answer = match read_description(&doc, SessionRole::Answerer) {
            Ok(answer) => answer,
            Err(e) => {
                self.fail(e.clone());
                return Err(e);
            }
        };
        match answer {
            Some(desc) => self.on_remote_description_available(desc).await,
            None => Ok(()),
        }
    }

    /// Применяет answer ровно один раз; повторные уведомления игнорируются.
    /// Только для звонящего, опубликовавшего offer.
    pub async fn on_remote_description_available(
        &mut self,
        desc: SessionDescription,
    ) -> Result<(), SignalingError> {
        if self.buffer.is_open() {
            debug!(session_id = ?self.session_id, "remote description already applied, ignoring");
            return Ok(());
        }
        if self.state.is_terminal() {
            return Ok(());
        }
        let published = matches!(
            self.state,
            SessionState::Published | SessionState::AwaitingRemote
        );
        if self.role != Some(SessionRole::Caller) || !published {
            return Err(SignalingError::InvalidState {
                op: "on_remote_description_available",
                state: self.state,
            });
        }
        if let Err(e) = self.apply_remote_description(desc).await {
            self.fail(e.clone());
            return Err(e);
        }
        self.set_state(SessionState::CandidatesFlowing);
        self.maybe_negotiated();
        Ok(())
    }

    async fn apply_remote_description(
        &mut self,
        desc: SessionDescription,
    ) -> Result<(), SignalingError> {
        info!(session_id = ?self.session_id, kind = %desc.kind, "applying remote description");
        self.transport.set_remote_description(desc).await?;
        self.set_state(SessionState::RemoteApplied);

        let pending = self.buffer.open();
        if !pending.is_empty() {
            info!(count = pending.len(), "replaying buffered remote candidates");
        }
        for candidate in pending {
            self.apply_remote_candidate(None, candidate).await;
        }
        Ok(())
    }

    /// Публикует локальный кандидат в подколлекцию своей роли
    pub async fn on_local_ice_candidate(&mut self, candidate: IceCandidate) {
        let (Some(role), Some(session_id)) = (self.role, self.session_id.clone()) else {
            warn!("local candidate before session start, dropping");
            return;
        };
        if self.gathering_complete || self.state.is_terminal() {
            debug!("candidate after gathering finished, dropping");
            return;
        }
        dump_candidate("LOCAL", &candidate);

        let sequence = self.local_sequence;
        self.local_sequence += 1;
        self.local_stats.record(&candidate);

        let record = CandidateRecord::new(&session_id, role, sequence, candidate);
        let value = match record.to_value() {
            Ok(v) => v,
            Err(e) => {
                self.report_candidate_error(Some(sequence), StoreError::from(e).into());
                return;
            }
        };
        let path = DocPath::new(self.config.calls_collection.as_str(), session_id.as_str());
        let collection = role.candidates_collection(&self.config).to_string();
        if let Err(e) = self
            .store
            .append_to_subcollection(&path, &collection, value)
            .await
        {
            self.report_candidate_error(Some(sequence), e.into());
        }
    }

    async fn on_remote_candidate_item(&mut self, item: Value) {
        let record = match CandidateRecord::from_value(item) {
            Ok(r) => r,
            Err(e) => {
                self.report_candidate_error(None, e);
                return;
            }
        };
        let Some(role) = self.role else { return };
        if record.origin != role.peer() {
            warn!(origin = ?record.origin, "candidate from own partition, ignoring");
            return;
        }
        if self.session_id.as_deref() != Some(record.session_id.as_str()) {
            warn!(record_session = %record.session_id, "candidate for another session, ignoring");
            return;
        }
        self.on_remote_ice_candidate_observed(record.sequence, record.candidate)
            .await;
    }

    /// Применяет удалённый кандидат сразу или откладывает до remote description
    pub async fn on_remote_ice_candidate_observed(&mut self, sequence: u64, candidate: IceCandidate) {
        if self.role.is_none() || self.state.is_terminal() {
            warn!(sequence, state = ?self.state, "remote candidate outside an active session, dropping");
            return;
        }
        match self.buffer.observe(sequence, candidate) {
            Admission::Apply(candidate) => {
                self.apply_remote_candidate(Some(sequence), candidate).await
            }
            Admission::Buffered => debug!(
                sequence,
                pending = self.buffer.pending_len(),
                "remote description not set yet, queuing candidate"
            ),
            Admission::Duplicate => debug!(sequence, "duplicate remote candidate, ignoring"),
        }
    }

    async fn apply_remote_candidate(&mut self, sequence: Option<u64>, candidate: IceCandidate) {
        dump_candidate("REMOTE", &candidate);
        if let Err(e) = self.transport.add_ice_candidate(candidate).await {
            self.report_candidate_error(sequence, e.into());
        }
    }

    fn on_gathering_complete(&mut self) {
        if self.gathering_complete {
            return;
        }
        self.gathering_complete = true;
        if let Some(id) = self.session_id.as_deref() {
            self.local_stats.log_summary(id);
        }
        self.maybe_negotiated();
    }

    fn maybe_negotiated(&mut self) {
        if self.state == SessionState::CandidatesFlowing && self.gathering_complete {
            self.set_state(SessionState::Negotiated);
        }
    }

    /// ========== TEARDOWN ==========

    /// Снимает подписки и освобождает Transport. Повторный вызов ничего не делает.
    pub async fn close(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;

        let subs = [
            self.doc_sub.take().map(|s| s.id()),
            self.candidates_sub.take().map(|s| s.id()),
        ];
        for id in subs.into_iter().flatten() {
            self.store.unsubscribe(id).await;
        }
        self.transport_events = None;
        if let Err(e) = self.transport.close().await {
            warn!(error = %e, "transport close failed");
        }
        self.buffer.clear();

        if self.state != SessionState::Failed {
            self.set_state(SessionState::Closed);
        }
        info!(session_id = ?self.session_id, "session closed");
        self.emit(CoordinatorEvent::Closed);
    }

    /// ========== HELPERS ==========

    fn set_state(&mut self, state: SessionState) {
        if self.state == state {
            return;
        }
        info!(session_id = ?self.session_id, role = ?self.role, from = ?self.state, to = ?state, "state changed");
        self.state = state;
        self.emit(CoordinatorEvent::StateChanged(state));
    }

    fn fail(&mut self, err: SignalingError) {
        error!(session_id = ?self.session_id, error = %err, "session failed");
        self.set_state(SessionState::Failed);
        self.emit(CoordinatorEvent::Failed(err));
    }

    fn report_candidate_error(&mut self, sequence: Option<u64>, error: SignalingError) {
        warn!(session_id = ?self.session_id, sequence = ?sequence, error = %error, "candidate exchange error");
        self.emit(CoordinatorEvent::CandidateError { sequence, error });
    }

    fn emit(&self, event: CoordinatorEvent) {
        // UI мог ещё не подписаться или уже отбросить получатель
        if let Some(tx) = &self.events_tx {
            let _ = tx.send(event);
        }
    }
}

async fn recv_sub<T>(sub: Option<&mut Subscription<T>>) -> Option<T> {
    match sub {
        Some(sub) => sub.recv().await,
        None => None,
    }
}

async fn recv_events(rx: Option<&mut TransportEvents>) -> Option<TransportEvent> {
    match rx {
        Some(rx) => rx.recv().await,
        None => None,
    }
}
