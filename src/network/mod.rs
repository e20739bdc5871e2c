//! Network Layer
//!
//! Message types exchanged with participants and the presentation layer.
//! Transport and wire encoding are the host's concern.

pub mod protocol;

pub use protocol::{CreateSessionRequest, ServerMessage, SoundCue};
