//! Game Logic Module
//!
//! Synchronous, room-local round logic. Nothing here touches the network
//! or the clock; the runtime drives it through [`round::Round`].
//!
//! ## Module Structure
//!
//! - `state`: Entity types, round state, snapshots
//! - `registry`: Keyed entity storage and bounded chat log
//! - `input`: Typed intents validated at the boundary
//! - `events`: Outbound game events
//! - `movement`: Move resolution (clamp, collision, pickup)
//! - `level`: Countdown, elimination, level advancement
//! - `round`: Round controller and its configuration

pub mod state;
pub mod registry;
pub mod input;
pub mod events;
pub mod movement;
pub mod level;
pub mod round;

// Re-export key types
pub use state::{
    ChatMessage, Item, ItemId, ItemKind, Obstacle, ObstacleId, Player, PlayerId, RoundPhase,
    RoundSnapshot, RoundState,
};
pub use registry::{EntityRegistry, RegistryError};
pub use input::{Intent, JoinOptions, MoveDelta};
pub use events::{GameEvent, GameEventData};
pub use movement::{MoveOutcome, MoveResolution};
pub use level::LevelOutcome;
pub use round::{Round, RoundConfig, RoundError};
