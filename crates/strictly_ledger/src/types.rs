//! Core domain types for the ledger-backed board.

use super::position::Position;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Ledger-assigned game identifier.
pub type GameId = u32;

/// One of the two sides of a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Actor {
    /// The human player (always moves first).
    Player,
    /// The house-operated opponent.
    House,
}

impl Actor {
    /// Returns the other side.
    pub fn opponent(self) -> Self {
        match self {
            Actor::Player => Actor::House,
            Actor::House => Actor::Player,
        }
    }

    /// Mark used when rendering the board.
    pub fn mark(self) -> char {
        match self {
            Actor::Player => 'X',
            Actor::House => 'O',
        }
    }
}

/// A cell on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum Cell {
    /// Empty cell.
    Empty,
    /// Cell claimed by an actor.
    Occupied(Actor),
}

impl Cell {
    /// Returns the occupying actor, if any.
    pub fn actor(self) -> Option<Actor> {
        match self {
            Cell::Empty => None,
            Cell::Occupied(actor) => Some(actor),
        }
    }
}

/// Canonical 3x3 board.
///
/// Boards are value snapshots. Every transition produces a new board;
/// nothing outside this crate can write a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct Board {
    /// Cells in row-major order, `index = row * 3 + column`.
    cells: [Cell; 9],
}

impl Board {
    /// Creates an empty board.
    pub fn new() -> Self {
        Self {
            cells: [Cell::Empty; 9],
        }
    }

    /// Gets the cell at the given position.
    pub fn get(&self, pos: Position) -> Cell {
        self.cells[pos.to_index()]
    }

    /// Checks if a cell is empty.
    pub fn is_empty(&self, pos: Position) -> bool {
        self.get(pos) == Cell::Empty
    }

    /// Returns all cells.
    pub fn cells(&self) -> &[Cell; 9] {
        &self.cells
    }

    /// Number of cells claimed by `actor`.
    pub fn count(&self, actor: Actor) -> usize {
        self.cells
            .iter()
            .filter(|c| **c == Cell::Occupied(actor))
            .count()
    }

    /// Number of non-empty cells.
    pub fn occupied(&self) -> usize {
        self.cells.iter().filter(|c| **c != Cell::Empty).count()
    }

    /// Returns a copy with one cell replaced.
    pub(crate) fn with(mut self, pos: Position, cell: Cell) -> Self {
        self.cells[pos.to_index()] = cell;
        self
    }

    /// Whether the cell counts could come from a game where the player moves
    /// first and turns alternate.
    pub fn has_alternating_counts(&self) -> bool {
        let player = self.count(Actor::Player);
        let house = self.count(Actor::House);
        player == house || player == house + 1
    }

    /// Formats the board as a human-readable grid.
    pub fn display(&self) -> String {
        let mut result = String::new();
        for row in 0..3 {
            for col in 0..3 {
                let idx = row * 3 + col;
                match self.cells[idx] {
                    Cell::Empty => result.push_str(&(idx + 1).to_string()),
                    Cell::Occupied(actor) => result.push(actor.mark()),
                }
                if col < 2 {
                    result.push('|');
                }
            }
            if row < 2 {
                result.push_str("\n-+-+-\n");
            }
        }
        result
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl From<[Cell; 9]> for Board {
    fn from(cells: [Cell; 9]) -> Self {
        Self { cells }
    }
}

/// Terminal status of a game.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, derive_more::Display,
)]
pub enum Outcome {
    /// Game is ongoing.
    #[display("in progress")]
    InProgress,
    /// The player completed a triad.
    #[display("player won")]
    PlayerWon,
    /// The house completed a triad.
    #[display("house won")]
    HouseWon,
    /// Board full, no triad.
    #[display("tie")]
    Tie,
}

impl Outcome {
    /// True for every outcome except `InProgress`.
    pub fn is_terminal(self) -> bool {
        self != Outcome::InProgress
    }

    /// The winning actor, if the game was won.
    pub fn winner(self) -> Option<Actor> {
        match self {
            Outcome::PlayerWon => Some(Actor::Player),
            Outcome::HouseWon => Some(Actor::House),
            Outcome::InProgress | Outcome::Tie => None,
        }
    }

    /// Outcome for a completed triad owned by `actor`.
    pub fn won_by(actor: Actor) -> Self {
        match actor {
            Actor::Player => Outcome::PlayerWon,
            Actor::House => Outcome::HouseWon,
        }
    }
}
