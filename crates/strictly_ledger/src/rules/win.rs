//! Triad detection.

use crate::{Actor, Board, Cell, Position};

/// The 8 winning triads, in evaluation order.
pub const LINES: [[Position; 3]; 8] = [
    // Rows
    [Position::TopLeft, Position::TopCenter, Position::TopRight],
    [Position::MiddleLeft, Position::Center, Position::MiddleRight],
    [Position::BottomLeft, Position::BottomCenter, Position::BottomRight],
    // Columns
    [Position::TopLeft, Position::MiddleLeft, Position::BottomLeft],
    [Position::TopCenter, Position::Center, Position::BottomCenter],
    [Position::TopRight, Position::MiddleRight, Position::BottomRight],
    // Diagonals
    [Position::TopLeft, Position::Center, Position::BottomRight],
    [Position::TopRight, Position::Center, Position::BottomLeft],
];

/// Returns the owner of `line` if all three cells belong to one actor.
pub fn line_owner(board: &Board, line: [Position; 3]) -> Option<Actor> {
    let [a, b, c] = line;
    match board.get(a) {
        Cell::Occupied(actor) if board.get(b) == board.get(a) && board.get(c) == board.get(a) => {
            Some(actor)
        }
        _ => None,
    }
}

/// Returns every completed triad with its owner, in evaluation order.
pub fn completed_lines(board: &Board) -> Vec<([Position; 3], Actor)> {
    LINES
        .iter()
        .filter_map(|line| line_owner(board, *line).map(|owner| (*line, owner)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board_with(cells: &[(Position, Actor)]) -> Board {
        cells.iter().fold(Board::new(), |b, (pos, actor)| {
            b.with(*pos, Cell::Occupied(*actor))
        })
    }

    #[test]
    fn test_no_lines_on_empty_board() {
        assert!(completed_lines(&Board::new()).is_empty());
    }

    #[test]
    fn test_top_row() {
        let board = board_with(&[
            (Position::TopLeft, Actor::Player),
            (Position::TopCenter, Actor::Player),
            (Position::TopRight, Actor::Player),
        ]);
        let lines = completed_lines(&board);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].1, Actor::Player);
    }

    #[test]
    fn test_anti_diagonal() {
        let board = board_with(&[
            (Position::TopRight, Actor::House),
            (Position::Center, Actor::House),
            (Position::BottomLeft, Actor::House),
        ]);
        assert_eq!(line_owner(&board, LINES[7]), Some(Actor::House));
    }

    #[test]
    fn test_mixed_line_has_no_owner() {
        let board = board_with(&[
            (Position::TopLeft, Actor::Player),
            (Position::TopCenter, Actor::House),
            (Position::TopRight, Actor::Player),
        ]);
        assert_eq!(line_owner(&board, LINES[0]), None);
    }
}
