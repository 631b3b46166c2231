//! Collision-Free Placement
//!
//! Rejection sampling of free board cells for spawning items, obstacles
//! and players. Sampling is bounded: once the attempt budget is spent the
//! generator hands back one more random cell without an exclusivity
//! guarantee and logs a warning. It never blocks.

use std::collections::BTreeSet;
use tracing::warn;

use super::grid::Cell;
use super::rng::DeterministicRng;

/// Rejection-sampling attempts before degrading.
pub const MAX_PLACEMENT_ATTEMPTS: u32 = 100;

/// Result of a single placement.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Placement {
    /// Chosen cell
    pub cell: Cell,
    /// False when the attempt budget ran out and `cell` may be occupied
    pub exclusive: bool,
}

/// Pick a cell on a `width × height` board that is not in `occupied`.
pub fn place(
    rng: &mut DeterministicRng,
    width: i32,
    height: i32,
    occupied: &BTreeSet<Cell>,
    max_attempts: u32,
) -> Placement {
    for _ in 0..max_attempts {
        let cell = rng.next_cell(width, height);
        if !occupied.contains(&cell) {
            return Placement { cell, exclusive: true };
        }
    }

    let cell = rng.next_cell(width, height);
    warn!(
        occupied = occupied.len(),
        attempts = max_attempts,
        %cell,
        "placement budget exhausted, using non-exclusive cell"
    );
    Placement { cell, exclusive: false }
}

/// Pick `count` cells, none of which coincide with `occupied` or with each
/// other (subject to the same degradation as [`place`]).
pub fn place_many(
    rng: &mut DeterministicRng,
    count: usize,
    width: i32,
    height: i32,
    occupied: &BTreeSet<Cell>,
    max_attempts: u32,
) -> Vec<Cell> {
    let mut taken = occupied.clone();
    let mut cells = Vec::with_capacity(count);

    for _ in 0..count {
        let placement = place(rng, width, height, &taken, max_attempts);
        taken.insert(placement.cell);
        cells.push(placement.cell);
    }

    cells
}
