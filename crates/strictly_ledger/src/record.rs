//! Authoritative game record and session score tally.

use crate::action::Move;
use crate::types::{Actor, Board, GameId, Outcome};
use chrono::{DateTime, Utc};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};

/// Who the ledger recorded as winner.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WinnerIdentity {
    /// A winning address.
    Address(String),
    /// The game ended without a winner (tie).
    NoWinner,
}

/// A move as committed to the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct RecordedMove {
    /// The move.
    mov: Move,
    /// Local commit time.
    committed_at: DateTime<Utc>,
}

impl RecordedMove {
    pub(crate) fn now(mov: Move) -> Self {
        Self {
            mov,
            committed_at: Utc::now(),
        }
    }
}

/// Committed state of one game.
///
/// `outcome == InProgress` exactly when `winner` is `None`. Once the outcome
/// is terminal the record is frozen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct GameRecord {
    /// Ledger game id.
    game_id: GameId,
    /// Identity (address) of the board owner.
    board_owner: String,
    /// Winner as recorded by the ledger.
    winner: Option<WinnerIdentity>,
    /// Moves made by both sides, `0..=9`.
    total_moves_made: u8,
    /// Actor holding the turn.
    next_turn: Actor,
    /// Terminal status.
    outcome: Outcome,
    /// Committed board.
    board: Board,
    /// Moves committed by this client, in order.
    log: Vec<RecordedMove>,
}

impl GameRecord {
    /// Creates the record of a freshly started game.
    pub fn new(game_id: GameId, board_owner: impl Into<String>) -> Self {
        Self {
            game_id,
            board_owner: board_owner.into(),
            winner: None,
            total_moves_made: 0,
            next_turn: Actor::Player,
            outcome: Outcome::InProgress,
            board: Board::new(),
            log: Vec::new(),
        }
    }

    /// True once the outcome is terminal.
    pub fn is_terminal(&self) -> bool {
        self.outcome.is_terminal()
    }

    /// Commits a move already validated against `board`.
    pub(crate) fn commit_move(&mut self, mov: Move, board: Board) {
        self.board = board;
        self.total_moves_made = self.total_moves_made.saturating_add(1);
        self.next_turn = mov.actor.opponent();
        self.log.push(RecordedMove::now(mov));
    }

    /// Freezes the record with a terminal outcome.
    pub(crate) fn finish(&mut self, outcome: Outcome, house_identity: &str) {
        self.winner = match outcome {
            Outcome::InProgress => None,
            Outcome::PlayerWon => Some(WinnerIdentity::Address(self.board_owner.clone())),
            Outcome::HouseWon => Some(WinnerIdentity::Address(house_identity.to_string())),
            Outcome::Tie => Some(WinnerIdentity::NoWinner),
        };
        self.outcome = outcome;
    }

    /// Replaces the whole record with a ledger snapshot.
    pub(crate) fn replace(
        &mut self,
        board: Board,
        total_moves_made: u8,
        next_turn: Actor,
        outcome: Outcome,
        winner: Option<WinnerIdentity>,
    ) {
        self.board = board;
        self.total_moves_made = total_moves_made;
        self.next_turn = next_turn;
        self.outcome = outcome;
        self.winner = winner;
    }
}

/// Session-wide results, monotonic until the session restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Getters)]
pub struct ScoreTally {
    /// Games the player won.
    player_wins: u32,
    /// Games the house won.
    house_wins: u32,
    /// Games ending in a tie.
    ties: u32,
}

impl ScoreTally {
    /// Counts one finished game.
    pub(crate) fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::PlayerWon => self.player_wins += 1,
            Outcome::HouseWon => self.house_wins += 1,
            Outcome::Tie => self.ties += 1,
            Outcome::InProgress => {}
        }
    }

    /// Total games counted.
    pub fn games(&self) -> u32 {
        self.player_wins + self.house_wins + self.ties
    }
}

impl std::fmt::Display for ScoreTally {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "You {} - {} House - {} Ties",
            self.player_wins, self.house_wins, self.ties
        )
    }
}
