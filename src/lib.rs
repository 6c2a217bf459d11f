pub mod config;
pub mod error;
pub mod logger;
pub mod peer;
pub mod session;
pub mod signaling;
pub mod store;
mod utils;

pub use config::{ConfigError, SignalingConfig};
pub use error::SignalingError;
pub use peer::{
    IceCandidate, MockTransport, RemoteTrack, SessionDescription, Transport, TransportError,
    TransportEvent, WebRtcTransport,
};
pub use session::{CandidateRecord, SessionId, SessionRole};
pub use signaling::{CoordinatorEvent, Inbound, SessionState, SignalingCoordinator};
pub use store::{DocPath, Document, DocumentStore, MemoryStore, StoreError, Subscription};
