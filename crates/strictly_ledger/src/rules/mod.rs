//! Win/tie evaluation.
//!
//! Pure functions over a canonical board. Rules are kept apart from board
//! storage so every decode path and the state machine share one verdict.

pub mod draw;
pub mod win;

pub use draw::is_full;
pub use win::{completed_lines, line_owner, LINES};

use crate::{Board, Outcome};
use tracing::{instrument, warn};

/// Error produced when a board cannot come from a legal game.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum RulesError {
    /// Both actors own a completed triad.
    #[display("Impossible board: both player and house complete a line")]
    ImpossibleBoardState,
}

impl std::error::Error for RulesError {}

/// Evaluates the terminal status of `board`.
///
/// Triads are scanned rows, columns, diagonals. The first completed triad
/// names the winner, unless the other actor also owns one.
///
/// # Errors
///
/// Returns [`RulesError::ImpossibleBoardState`] when both actors have a
/// completed triad.
#[instrument(skip(board), fields(occupied = board.occupied()))]
pub fn evaluate(board: &Board) -> Result<Outcome, RulesError> {
    let lines = completed_lines(board);

    if let Some((_, first)) = lines.first() {
        if lines.iter().any(|(_, owner)| owner != first) {
            warn!(lines = lines.len(), "Both actors complete a triad");
            return Err(RulesError::ImpossibleBoardState);
        }
        return Ok(Outcome::won_by(*first));
    }

    if is_full(board) {
        return Ok(Outcome::Tie);
    }

    Ok(Outcome::InProgress)
}

/// Returns the cells of the first completed triad, for highlighting.
pub fn winning_line(board: &Board) -> Option<[crate::Position; 3]> {
    completed_lines(board).first().map(|(line, _)| *line)
}
