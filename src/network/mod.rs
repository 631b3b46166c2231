//! Network Layer
//!
//! Async runtime around the synchronous round: the JSON wire protocol and
//! the per-room actor that serializes every mutation. Transport (sockets,
//! handshakes) is left to the embedding server.

pub mod protocol;
pub mod room;

pub use protocol::{ClientMessage, ServerMessage, RoomEvent, StateUpdate, ProtocolError};
pub use room::{RoomCommand, RoomConfig, RoomError, RoomHandle, RoomId, RoomManager, RoomSession};
