//! Core primitives.
//!
//! Leaf utilities shared by every room: board geometry, the seeded RNG,
//! collision-free placement and state hashing.

pub mod grid;
pub mod rng;
pub mod placement;
pub mod hash;

// Re-export core types
pub use grid::{Cell, GRID_WIDTH, GRID_HEIGHT};
pub use rng::DeterministicRng;
pub use placement::{place, place_many, Placement, MAX_PLACEMENT_ATTEMPTS};
pub use hash::{StateHash, compute_state_hash};
