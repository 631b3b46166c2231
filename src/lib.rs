//! # Grid Arena Server
//!
//! Authoritative room server for a small real-time grid arena game.
//! Players move on a 20×20 board, collect items, avoid obstacles and
//! survive timed levels where the lowest scorers are eliminated.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    GRID ARENA SERVER                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Leaf primitives                           │
//! │  ├── grid.rs     - Cells, board size, clamped offsets        │
//! │  ├── rng.rs      - Seeded Xorshift128+ PRNG                  │
//! │  ├── placement.rs- Collision-free cell sampling              │
//! │  └── hash.rs     - State hashing for snapshots               │
//! │                                                              │
//! │  game/           - Round logic (synchronous)                 │
//! │  ├── state.rs    - Entities, round state, snapshots          │
//! │  ├── registry.rs - Entity storage and chat log               │
//! │  ├── input.rs    - Typed player intents                      │
//! │  ├── movement.rs - Move resolution                           │
//! │  ├── level.rs    - Countdown, elimination, advancement       │
//! │  └── round.rs    - Round controller                          │
//! │                                                              │
//! │  network/        - Runtime (tokio)                           │
//! │  ├── protocol.rs - JSON wire messages                        │
//! │  └── room.rs     - Single-writer room actors                 │
//! │                                                              │
//! │  scores.rs       - Final score persistence                   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Single Writer
//!
//! A room's [`Round`] is owned by exactly one actor task. The tick and
//! every client intent are handled one at a time from the same loop:
//! - No locks around game state
//! - No handler observes another's partial mutation
//! - Rooms share nothing
//!
//! Given the same seed, a round generates the same arena, which the tests
//! rely on.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod network;
pub mod scores;

// Re-export commonly used types
pub use core::grid::{Cell, GRID_WIDTH, GRID_HEIGHT};
pub use core::rng::DeterministicRng;
pub use game::input::{Intent, JoinOptions, MoveDelta};
pub use game::round::{Round, RoundConfig, RoundError};
pub use game::state::{PlayerId, RoundSnapshot, RoundState};
pub use network::room::{RoomConfig, RoomHandle, RoomManager};
pub use scores::{JsonFileSink, MemorySink, ScoreRecord, ScoreSink};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Countdown tick period (seconds)
pub const TICK_PERIOD_SECS: u64 = 1;
