use serde::Serialize;

/// Состояние переговоров одной сессии
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    LocalDescriptionCreated,
    Published,
    AwaitingRemote,
    RemoteApplied,
    CandidatesFlowing,
    Negotiated,
    Closed,
    Failed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Failed)
    }
}
