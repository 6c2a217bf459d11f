use crate::peer::types::{IceCandidate, RemoteTrack, SessionDescription};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

/// Ошибки Transport (peer connection отклонил операцию)
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("create {0} failed: {1}")]
    Create(&'static str, String),
    #[error("set local description failed: {0}")]
    SetLocal(String),
    #[error("set remote description failed: {0}")]
    SetRemote(String),
    #[error("add ICE candidate failed: {0}")]
    AddCandidate(String),
    #[error("peer connection setup failed: {0}")]
    Setup(String),
    #[error("transport closed")]
    Closed,
}

/// События от Transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Локальный кандидат; `None` означает конец сбора
    IceCandidate(Option<IceCandidate>),
    Track(RemoteTrack),
}

pub type TransportEvents = mpsc::UnboundedReceiver<TransportEvent>;

/// Peer connection, которым управляет координатор.
///
/// Реализации: `WebRtcTransport` поверх крейта `webrtc` и `MockTransport` для тестов.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn create_offer(&self) -> Result<SessionDescription, TransportError>;

    async fn create_answer(&self) -> Result<SessionDescription, TransportError>;

    async fn set_local_description(&self, desc: SessionDescription)
        -> Result<(), TransportError>;

    async fn set_remote_description(
        &self,
        desc: SessionDescription,
    ) -> Result<(), TransportError>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), TransportError>;

    /// Освобождает ресурсы peer connection
    async fn close(&self) -> Result<(), TransportError>;

    /// Поток событий onIceCandidate / onTrack. Отдаётся один раз.
    fn take_events(&self) -> Option<TransportEvents>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn create_offer(&self) -> Result<SessionDescription, TransportError> {
        (**self).create_offer().await
    }

    async fn create_answer(&self) -> Result<SessionDescription, TransportError> {
        (**self).create_answer().await
    }

    async fn set_local_description(
        &self,
        desc: SessionDescription,
    ) -> Result<(), TransportError> {
        (**self).set_local_description(desc).await
    }

    async fn set_remote_description(
        &self,
        desc: SessionDescription,
    ) -> Result<(), TransportError> {
        (**self).set_remote_description(desc).await
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), TransportError> {
        (**self).add_ice_candidate(candidate).await
    }

    async fn close(&self) -> Result<(), TransportError> {
        (**self).close().await
    }

    fn take_events(&self) -> Option<TransportEvents> {
        (**self).take_events()
    }
}
