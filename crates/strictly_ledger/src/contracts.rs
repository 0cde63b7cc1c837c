//! Move applier with contract-based validation.
//!
//! Contracts define correctness through preconditions and postconditions.
//! They formalize the Hoare-style reasoning: {P} action {Q}

use super::action::{Move, MoveError};
use super::types::{Actor, Board, Cell};
use tracing::{debug, instrument, warn};

// ─────────────────────────────────────────────────────────────
//  Contract Trait
// ─────────────────────────────────────────────────────────────

/// A contract defines preconditions and postconditions for state transitions.
pub trait Contract<S, A> {
    /// Checks preconditions before applying the action.
    fn pre(state: &S, action: &A) -> Result<(), MoveError>;

    /// Checks postconditions relating the state before and after the action.
    fn post(before: &S, after: &S, action: &A) -> Result<(), MoveError>;
}

/// Board plus the actor expected to move next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Turn {
    /// Board the move is applied to.
    pub board: Board,
    /// Actor whose turn it is.
    pub to_move: Actor,
}

// ─────────────────────────────────────────────────────────────
//  Move Preconditions
// ─────────────────────────────────────────────────────────────

/// Precondition: the target cell must be empty.
pub struct CellIsEmpty;

impl CellIsEmpty {
    /// Checks the target cell of `mov`.
    pub fn check(mov: &Move, board: &Board) -> Result<(), MoveError> {
        if board.is_empty(mov.position) {
            Ok(())
        } else {
            Err(MoveError::CellOccupied(mov.position))
        }
    }
}

/// Precondition: the moving actor must hold the turn.
pub struct ActorsTurn;

impl ActorsTurn {
    /// Checks the actor of `mov` against `to_move`.
    pub fn check(mov: &Move, to_move: Actor) -> Result<(), MoveError> {
        if mov.actor == to_move {
            Ok(())
        } else {
            Err(MoveError::OutOfTurn {
                expected: to_move,
                actual: mov.actor,
            })
        }
    }
}

// ─────────────────────────────────────────────────────────────
//  Move Postcondition
// ─────────────────────────────────────────────────────────────

/// Postcondition: exactly one cell differs, and it went from empty to the mover.
pub struct SingleCellDelta;

impl SingleCellDelta {
    /// Returns true if `after` is `before` plus exactly `mov`.
    pub fn holds(before: &Board, after: &Board, mov: &Move) -> bool {
        let changed: Vec<usize> = before
            .cells()
            .iter()
            .zip(after.cells().iter())
            .enumerate()
            .filter(|(_, (b, a))| b != a)
            .map(|(i, _)| i)
            .collect();

        let valid = changed == [mov.position.to_index()]
            && before.get(mov.position) == Cell::Empty
            && after.get(mov.position) == Cell::Occupied(mov.actor);
        if !valid {
            warn!(?changed, position = ?mov.position, "Single-cell delta violated");
        }
        valid
    }
}

// ─────────────────────────────────────────────────────────────
//  Move Contract (Pre + Post)
// ─────────────────────────────────────────────────────────────

/// Contract for placing a mark.
///
/// Preconditions:
/// - Actor holds the turn
/// - Target cell is empty
///
/// Postconditions:
/// - Exactly one cell changed, `Empty -> actor`
pub struct MoveContract;

impl Contract<Turn, Move> for MoveContract {
    fn pre(turn: &Turn, action: &Move) -> Result<(), MoveError> {
        ActorsTurn::check(action, turn.to_move)?;
        CellIsEmpty::check(action, &turn.board)
    }

    fn post(before: &Turn, after: &Turn, action: &Move) -> Result<(), MoveError> {
        if SingleCellDelta::holds(&before.board, &after.board, action) {
            Ok(())
        } else {
            Err(MoveError::InvariantViolation(format!(
                "Postcondition failed: applying {} changed more than one cell",
                action
            )))
        }
    }
}

/// Applies `mov` to `board`, returning the new board.
///
/// The input board is never modified.
///
/// # Errors
///
/// - [`MoveError::OutOfTurn`] if `mov.actor != to_move`
/// - [`MoveError::CellOccupied`] if the target cell is taken
#[instrument(skip(board), fields(position = ?mov.position, actor = ?mov.actor))]
pub fn apply(board: &Board, mov: &Move, to_move: Actor) -> Result<Board, MoveError> {
    let before = Turn {
        board: *board,
        to_move,
    };
    MoveContract::pre(&before, mov)?;

    let after = Turn {
        board: board.with(mov.position, Cell::Occupied(mov.actor)),
        to_move: to_move.opponent(),
    };

    #[cfg(debug_assertions)]
    MoveContract::post(&before, &after, mov)?;

    debug!(occupied = after.board.occupied(), "Move applied");
    Ok(after.board)
}
