//! Grid Geometry
//!
//! Integer cells on the fixed-size arena board.
//! Movement never leaves the board: offsets are clamped, not rejected.

use std::fmt;
use serde::{Serialize, Deserialize};

/// Board width in cells.
pub const GRID_WIDTH: i32 = 20;

/// Board height in cells.
pub const GRID_HEIGHT: i32 = 20;

/// A single board cell.
///
/// Ordered row-major (by `x`, then `y`) so it can live in `BTreeSet`s
/// with a stable iteration order.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Cell {
    /// Column, `0..width`
    pub x: i32,
    /// Row, `0..height`
    pub y: i32,
}

impl Cell {
    /// Create a cell from coordinates.
    #[inline]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Check if this cell lies on a `width × height` board.
    #[inline]
    pub fn in_bounds(self, width: i32, height: i32) -> bool {
        self.x >= 0 && self.x < width && self.y >= 0 && self.y < height
    }

    /// Move by `(dx, dy)` and clamp the result onto the board.
    ///
    /// Saturating adds keep arbitrarily large deltas from overflowing
    /// before the clamp is applied.
    #[inline]
    pub fn offset_clamped(self, dx: i32, dy: i32, width: i32, height: i32) -> Self {
        Self {
            x: self.x.saturating_add(dx).clamp(0, width - 1),
            y: self.y.saturating_add(dy).clamp(0, height - 1),
        }
    }
}

impl fmt::Debug for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_offset_inside_board() {
        let cell = Cell::new(5, 5);
        assert_eq!(cell.offset_clamped(1, -1, GRID_WIDTH, GRID_HEIGHT), Cell::new(6, 4));
        assert_eq!(cell.offset_clamped(0, 0, GRID_WIDTH, GRID_HEIGHT), cell);
    }

    #[test]
    fn test_offset_clamps_at_edges() {
        let corner = Cell::new(0, 19);
        assert_eq!(corner.offset_clamped(-1, 1, GRID_WIDTH, GRID_HEIGHT), Cell::new(0, 19));
        assert_eq!(corner.offset_clamped(100, -100, GRID_WIDTH, GRID_HEIGHT), Cell::new(19, 0));
    }

    #[test]
    fn test_offset_extreme_deltas() {
        let cell = Cell::new(10, 10);
        assert_eq!(
            cell.offset_clamped(i32::MAX, i32::MIN, GRID_WIDTH, GRID_HEIGHT),
            Cell::new(19, 0)
        );
    }

    #[test]
    fn test_row_major_ordering() {
        assert!(Cell::new(0, 5) < Cell::new(1, 0));
        assert!(Cell::new(3, 1) < Cell::new(3, 2));
    }

    proptest! {
        #[test]
        fn prop_clamped_offset_stays_on_board(
            x in 0..GRID_WIDTH,
            y in 0..GRID_HEIGHT,
            dx in any::<i32>(),
            dy in any::<i32>(),
        ) {
            let moved = Cell::new(x, y).offset_clamped(dx, dy, GRID_WIDTH, GRID_HEIGHT);
            prop_assert!(moved.in_bounds(GRID_WIDTH, GRID_HEIGHT));
        }
    }
}
