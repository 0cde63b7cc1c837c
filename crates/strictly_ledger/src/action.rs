//! First-class move type.
//!
//! Moves are immutable domain events. Once recorded they are only
//! appended to a game's log, never edited.

use super::position::Position;
use super::types::{Actor, GameId};
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// A move: an actor claiming a cell in a specific game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Move {
    /// Game the move belongs to.
    pub game_id: GameId,
    /// The cell being claimed.
    pub position: Position,
    /// Who is moving.
    pub actor: Actor,
}

impl Move {
    /// Creates a new move.
    #[instrument]
    pub fn new(game_id: GameId, position: Position, actor: Actor) -> Self {
        Self {
            game_id,
            position,
            actor,
        }
    }

    /// Creates a move from raw ledger coordinates.
    ///
    /// # Errors
    ///
    /// Returns [`MoveError::OutOfBounds`] when either coordinate is outside `0..=2`.
    #[instrument]
    pub fn from_coords(
        game_id: GameId,
        column: u64,
        row: u64,
        actor: Actor,
    ) -> Result<Self, MoveError> {
        let position =
            Position::from_coords(column, row).ok_or(MoveError::OutOfBounds { column, row })?;
        Ok(Self::new(game_id, position, actor))
    }
}

impl std::fmt::Display for Move {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} -> {}", self.actor, self.position)
    }
}

/// Error that can occur when validating or applying a move.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum MoveError {
    /// Coordinates outside the board.
    #[display("Coordinates ({column}, {row}) are outside the board")]
    OutOfBounds {
        /// Requested column.
        column: u64,
        /// Requested row.
        row: u64,
    },

    /// The target cell is already claimed.
    #[display("Cell {} is already occupied", _0)]
    CellOccupied(Position),

    /// The moving actor does not match the expected turn.
    #[display("It's not {actual:?}'s turn ({expected:?} to move)")]
    OutOfTurn {
        /// Actor whose turn it is.
        expected: Actor,
        /// Actor that tried to move.
        actual: Actor,
    },

    /// A postcondition failed after applying the move.
    #[display("Invariant violation: {}", _0)]
    InvariantViolation(String),
}

impl std::error::Error for MoveError {}
