pub mod buffer;
pub mod coordinator;
pub mod events;
pub mod state;

pub use buffer::{Admission, CandidateBuffer};
pub use coordinator::{Inbound, SignalingCoordinator};
pub use events::CoordinatorEvent;
pub use state::SessionState;
