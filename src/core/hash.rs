//! State Hashing
//!
//! SHA-256 digest of the round state and the seed it grew from. Attached
//! to every snapshot; the room actor compares it with the last broadcast
//! and skips re-sending unchanged state. Clients can use it to detect
//! divergence.

use sha2::{Sha256, Digest};
use super::grid::Cell;

/// Hash output type (256 bits / 32 bytes)
pub type StateHash = [u8; 32];

/// Incremental hasher for round state.
///
/// Order of updates matters; callers feed collections in `BTreeMap` order.
pub struct StateHasher {
    hasher: Sha256,
}

impl StateHasher {
    /// Create a new hasher with domain separator.
    pub fn new(domain: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(domain);
        Self { hasher }
    }

    /// Create hasher for round state.
    pub fn for_round_state() -> Self {
        Self::new(b"GRID_ARENA_STATE_V1")
    }

    /// Update with a u8 value.
    #[inline]
    pub fn update_u8(&mut self, value: u8) {
        self.hasher.update([value]);
    }

    /// Update with a u32 value (little-endian).
    #[inline]
    pub fn update_u32(&mut self, value: u32) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with a u64 value (little-endian).
    #[inline]
    pub fn update_u64(&mut self, value: u64) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with an i64 value (little-endian).
    #[inline]
    pub fn update_i64(&mut self, value: i64) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with a boolean.
    #[inline]
    pub fn update_bool(&mut self, value: bool) {
        self.update_u8(value as u8);
    }

    /// Update with a length-prefixed string.
    #[inline]
    pub fn update_str(&mut self, value: &str) {
        self.update_u32(value.len() as u32);
        self.hasher.update(value.as_bytes());
    }

    /// Update with a board cell.
    #[inline]
    pub fn update_cell(&mut self, cell: Cell) {
        self.hasher.update(cell.x.to_le_bytes());
        self.hasher.update(cell.y.to_le_bytes());
    }

    /// Update with a UUID (16 bytes).
    #[inline]
    pub fn update_uuid(&mut self, uuid: &[u8; 16]) {
        self.hasher.update(uuid);
    }

    /// Finalize and return the hash.
    pub fn finalize(self) -> StateHash {
        self.hasher.finalize().into()
    }
}

/// Compute the round state hash.
///
/// Level and timer are always hashed first; `add_state` appends the
/// entity collections.
pub fn compute_state_hash<F>(level: u32, remaining_time: u32, add_state: F) -> StateHash
where
    F: FnOnce(&mut StateHasher),
{
    let mut hasher = StateHasher::for_round_state();

    hasher.update_u32(level);
    hasher.update_u32(remaining_time);

    add_state(&mut hasher);

    hasher.finalize()
}
