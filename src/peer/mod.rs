pub mod connection;
pub mod ice;
pub mod mock;
pub mod transport;
pub mod types;

pub use connection::WebRtcTransport;
pub use mock::{MockOp, MockTransport, TransportCall};
pub use transport::{Transport, TransportError, TransportEvent, TransportEvents};
pub use types::{IceCandidate, MediaKind, RemoteTrack, SdpType, ServerConfig, SessionDescription};
