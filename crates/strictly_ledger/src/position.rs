//! Board coordinates.

use super::types::Board;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// A cell position on the board.
///
/// The ledger addresses cells by `(column, row)` with both in `0..=2`;
/// the canonical index is `row * 3 + column`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, strum::EnumIter,
)]
pub enum Position {
    /// Column 0, row 0 (index 0)
    TopLeft,
    /// Column 1, row 0 (index 1)
    TopCenter,
    /// Column 2, row 0 (index 2)
    TopRight,
    /// Column 0, row 1 (index 3)
    MiddleLeft,
    /// Column 1, row 1 (index 4)
    Center,
    /// Column 2, row 1 (index 5)
    MiddleRight,
    /// Column 0, row 2 (index 6)
    BottomLeft,
    /// Column 1, row 2 (index 7)
    BottomCenter,
    /// Column 2, row 2 (index 8)
    BottomRight,
}

impl Position {
    /// All 9 positions in index order.
    pub const ALL: [Position; 9] = [
        Position::TopLeft,
        Position::TopCenter,
        Position::TopRight,
        Position::MiddleLeft,
        Position::Center,
        Position::MiddleRight,
        Position::BottomLeft,
        Position::BottomCenter,
        Position::BottomRight,
    ];

    /// Get label for this position (for display).
    pub fn label(&self) -> &'static str {
        match self {
            Position::TopLeft => "Top-left",
            Position::TopCenter => "Top-center",
            Position::TopRight => "Top-right",
            Position::MiddleLeft => "Middle-left",
            Position::Center => "Center",
            Position::MiddleRight => "Middle-right",
            Position::BottomLeft => "Bottom-left",
            Position::BottomCenter => "Bottom-center",
            Position::BottomRight => "Bottom-right",
        }
    }

    /// Converts position to board index (0-8).
    pub fn to_index(self) -> usize {
        match self {
            Position::TopLeft => 0,
            Position::TopCenter => 1,
            Position::TopRight => 2,
            Position::MiddleLeft => 3,
            Position::Center => 4,
            Position::MiddleRight => 5,
            Position::BottomLeft => 6,
            Position::BottomCenter => 7,
            Position::BottomRight => 8,
        }
    }

    /// Creates position from board index.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Creates position from ledger coordinates.
    ///
    /// Returns `None` when either coordinate is outside `0..=2`.
    #[instrument]
    pub fn from_coords(column: u64, row: u64) -> Option<Self> {
        if column > 2 || row > 2 {
            return None;
        }
        Self::from_index((row * 3 + column) as usize)
    }

    /// Ledger column (x) of this position.
    pub fn column(self) -> u8 {
        (self.to_index() % 3) as u8
    }

    /// Ledger row (y) of this position.
    pub fn row(self) -> u8 {
        (self.to_index() / 3) as u8
    }

    /// Parse from `"column row"`, `"column,row"`, or a label.
    pub fn parse(s: &str) -> Option<Position> {
        let parts: Vec<&str> = s
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|p| !p.is_empty())
            .collect();
        if let [col, row] = parts.as_slice()
            && let (Ok(col), Ok(row)) = (col.parse::<u64>(), row.parse::<u64>())
        {
            return Self::from_coords(col, row);
        }

        let s_lower = s.trim().to_lowercase();
        if s_lower.is_empty() {
            return None;
        }
        <Position as strum::IntoEnumIterator>::iter()
            .find(|pos| pos.label().to_lowercase() == s_lower)
    }

    /// Returns only the empty positions of `board`.
    #[instrument(skip(board))]
    pub fn valid_moves(board: &Board) -> Vec<Position> {
        Self::ALL
            .iter()
            .copied()
            .filter(|pos| board.is_empty(*pos))
            .collect()
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}, {})", self.label(), self.column(), self.row())
    }
}
