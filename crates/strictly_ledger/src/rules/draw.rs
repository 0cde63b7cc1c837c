//! Full-board detection.

use crate::{Board, Cell};

/// Checks if every cell is occupied.
///
/// A full board with no completed triad is a tie.
pub fn is_full(board: &Board) -> bool {
    board.cells().iter().all(|c| *c != Cell::Empty)
}
