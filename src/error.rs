use crate::peer::TransportError;
use crate::signaling::SessionState;
use crate::store::StoreError;
use thiserror::Error;

/// Ошибки координатора сигналинга
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignalingError {
    /// Transport отклонил операцию; сессия не может продолжаться
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Сбой чтения или записи в хранилище
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Сессии нет или в ней ещё нет offer
    #[error("session {0} not found or has no offer")]
    SessionNotFound(String),

    /// Ответ уже записан другим отвечающим
    #[error("session {0} already has an answer")]
    Conflict(String),

    #[error("operation `{op}` not allowed in state {state:?}")]
    InvalidState { op: &'static str, state: SessionState },

    #[error("session id cannot be empty")]
    InvalidSessionId,

    /// Поле документа не удалось разобрать
    #[error("malformed {what}: {reason}")]
    Malformed { what: &'static str, reason: String },
}

impl SignalingError {
    pub(crate) fn malformed(what: &'static str, err: impl ToString) -> Self {
        SignalingError::Malformed {
            what,
            reason: err.to_string(),
        }
    }
}
