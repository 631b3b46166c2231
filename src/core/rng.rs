//! Seeded Random Number Generator
//!
//! Xorshift128+ seeded through SplitMix64. Every room owns one, so an
//! arena can be reproduced from its seed (tests rely on this).

use serde::{Serialize, Deserialize};
use sha2::{Sha256, Digest};

use super::grid::Cell;

/// Seeded PRNG using the Xorshift128+ algorithm.
///
/// # Example
///
/// ```
/// use grid_arena::core::rng::DeterministicRng;
///
/// let mut a = DeterministicRng::new(12345);
/// let mut b = DeterministicRng::new(12345);
/// assert_eq!(a.next_u64(), b.next_u64());
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeterministicRng {
    state: [u64; 2],
}

impl Default for DeterministicRng {
    fn default() -> Self {
        Self::new(0)
    }
}

impl DeterministicRng {
    /// Create a new RNG from a 64-bit seed.
    pub fn new(seed: u64) -> Self {
        let mut s = seed;
        let state0 = splitmix64(&mut s);
        let state1 = splitmix64(&mut s);

        // All-zero state would emit zeros forever
        let state = if state0 == 0 && state1 == 0 {
            [1, 1]
        } else {
            [state0, state1]
        };

        Self { state }
    }

    /// Generate the next 64-bit random value.
    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        let s0 = self.state[0];
        let mut s1 = self.state[1];
        let result = s0.wrapping_add(s1);

        s1 ^= s0;
        self.state[0] = s0.rotate_left(24) ^ s1 ^ (s1 << 16);
        self.state[1] = s1.rotate_left(37);

        result
    }

    /// Generate a random integer in range [0, max).
    #[inline]
    pub fn next_int(&mut self, max: u32) -> u32 {
        if max == 0 {
            return 0;
        }
        // Modulo bias is negligible for board-sized ranges
        (self.next_u64() % max as u64) as u32
    }

    /// Uniformly random cell on a `width × height` board.
    #[inline]
    pub fn next_cell(&mut self, width: i32, height: i32) -> Cell {
        let x = self.next_int(width.max(0) as u32) as i32;
        let y = self.next_int(height.max(0) as u32) as i32;
        Cell::new(x, y)
    }
}

#[inline]
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

/// Derive a room seed from the room id and caller-supplied entropy.
///
/// Logging the room id and entropy is enough to rebuild the arena later.
pub fn derive_room_seed(room_id: &[u8; 16], entropy: u64) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(b"GRID_ARENA_SEED_V1");
    hasher.update(room_id);
    hasher.update(entropy.to_le_bytes());
    let hash = hasher.finalize();

    let mut seed = [0u8; 8];
    seed.copy_from_slice(&hash[..8]);
    u64::from_le_bytes(seed)
}
