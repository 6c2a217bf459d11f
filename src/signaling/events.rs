use crate::error::SignalingError;
use crate::peer::types::RemoteTrack;
use crate::signaling::SessionState;

/// События координатора для UI
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorEvent {
    StateChanged(SessionState),
    RemoteTrack(RemoteTrack),
    /// Сбой публикации или применения одного кандидата; сессия продолжается
    CandidateError {
        sequence: Option<u64>,
        error: SignalingError,
    },
    Failed(SignalingError),
    Closed,
}
