pub mod close;
pub mod control;
pub mod frames;
pub mod kinds;

pub use close::CloseReason;
pub use control::{ControlMessage, ProtocolError};
pub use frames::{Event, EventPayload, PongFrame};
pub use kinds::EventKind;
