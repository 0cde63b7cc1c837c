//! Boundary with the external ledger.
//!
//! The core never talks to a ledger directly; it consumes whatever
//! implements [`Ledger`]. Wire types here mirror what the ledger-access
//! collaborator returns.

use crate::codec::RawBoard;
use crate::error::ConsistencyWarning;
use crate::types::GameId;
use derive_more::{Display, Error};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{error, instrument};

/// Coordinates of a move reported by the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Coords {
    /// Column (x).
    pub column: u64,
    /// Row (y).
    pub row: u64,
}

/// Terminal flags attached to a confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeFlags {
    /// Player completed a triad.
    pub winner_is_player: bool,
    /// House completed a triad.
    pub winner_is_house: bool,
    /// Board full without a triad.
    pub is_tie: bool,
}

/// Result of submitting one move to the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MoveReceipt {
    /// Whether the transaction was accepted.
    pub transaction_confirmed: bool,
    /// House reply embedded in the same transaction.
    #[serde(default)]
    pub house_move: Option<Coords>,
    /// Terminal flags, when the ledger reported them.
    #[serde(default)]
    pub outcome: Option<OutcomeFlags>,
    /// Set when the transaction was accepted but its events could not be
    /// read. The player move stands; the rest must come from a reload.
    #[serde(default)]
    pub unreadable_reply: Option<String>,
    /// Ambiguities found while reading the transaction's events.
    #[serde(skip)]
    pub warnings: Vec<ConsistencyWarning>,
}

impl MoveReceipt {
    /// A receipt for an accepted transaction.
    pub fn confirmed(house_move: Option<Coords>, outcome: Option<OutcomeFlags>) -> Self {
        Self {
            transaction_confirmed: true,
            house_move,
            outcome,
            unreadable_reply: None,
            warnings: Vec::new(),
        }
    }

    /// A receipt for a rejected transaction.
    pub fn rejected() -> Self {
        Self {
            transaction_confirmed: false,
            ..Self::confirmed(None, None)
        }
    }

    /// A receipt for an accepted transaction whose events were unreadable.
    pub fn unreadable(reason: impl Into<String>) -> Self {
        Self {
            unreadable_reply: Some(reason.into()),
            ..Self::confirmed(None, None)
        }
    }
}

/// Authoritative snapshot of one game as stored on the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthoritativeState {
    /// Identity (address) of the board owner.
    pub player_identity: String,
    /// Identity of the winner, or `None`/zero address while undecided.
    #[serde(default)]
    pub winner_identity: Option<String>,
    /// Moves made by both sides.
    pub total_moves_made: u8,
    /// True when the player holds the turn.
    pub is_player_turn: bool,
    /// Board in whichever shape the ledger exposes.
    pub raw_board: RawBoard,
}

/// Ledger access error with location tracking.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
#[display("Ledger error: {} at {}:{}", message, file, line)]
pub struct LedgerError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl LedgerError {
    /// Creates a new ledger error with caller location tracking.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: impl Into<String>) -> Self {
        let message = message.into();
        let loc = std::panic::Location::caller();
        error!(error_message = %message, "Ledger error created");
        Self {
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }
}

/// Read/write interface of the external ledger.
#[async_trait::async_trait]
pub trait Ledger: Send + Sync {
    /// Submits a player move and waits for the transaction to settle.
    async fn submit_move(
        &self,
        game_id: GameId,
        column: u8,
        row: u8,
    ) -> Result<MoveReceipt, LedgerError>;

    /// Reads the authoritative state of a game.
    async fn fetch_authoritative_state(
        &self,
        game_id: GameId,
    ) -> Result<AuthoritativeState, LedgerError>;

    /// Requests a new game and returns its id.
    async fn start_game(&self) -> Result<GameId, LedgerError>;
}

/// True if an identity is the ledger's zero address.
pub fn is_zero_identity(identity: &str) -> bool {
    let trimmed = identity.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    digits.chars().all(|c| c == '0')
}

/// Compares two identities numerically, ignoring case and leading zeros.
pub fn same_identity(a: &str, b: &str) -> bool {
    fn normalize(s: &str) -> String {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        digits.trim_start_matches('0').to_lowercase()
    }
    normalize(a) == normalize(b)
}
