//! Error taxonomy for the synchronization core.

use crate::action::MoveError;
use crate::codec::CodecError;
use crate::ledger::LedgerError;
use crate::rules::RulesError;
use crate::types::Outcome;
use tracing::warn;

/// Why a player move was refused before reaching the ledger.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum RejectReason {
    /// A previous move is still awaiting confirmation.
    #[display("a move is already awaiting confirmation")]
    ConfirmationPending,
    /// The house has not answered the last move yet.
    #[display("waiting for the house to move")]
    AwaitingHouse,
    /// The game has ended.
    #[display("game is over ({})", _0)]
    GameOver(Outcome),
    /// Local state disagrees with the ledger and must be reloaded first.
    #[display("state must be reloaded from the ledger first")]
    ReloadRequired,
    /// The move itself is illegal on the current board.
    #[display("{}", _0)]
    Illegal(MoveError),
    /// A rematch was requested before the game ended.
    #[display("game is still in progress")]
    GameInProgress,
}

/// Every error the core surfaces to callers.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::From)]
pub enum SyncError {
    /// A raw board could not be decoded.
    #[display("{}", _0)]
    #[from]
    Codec(CodecError),

    /// A decoded board cannot come from a legal game.
    #[display("{}", _0)]
    #[from]
    Rules(RulesError),

    /// The move applier refused a move.
    #[display("{}", _0)]
    #[from]
    Move(MoveError),

    /// A player move failed local preconditions and was never submitted.
    #[display("Move rejected: {}", _0)]
    MoveRejectedLocally(RejectReason),

    /// The ledger did not confirm the move.
    #[display("Move failed: {}", _0)]
    MoveFailed(String),

    /// The ledger could not be reached for a state query.
    #[display("{}", _0)]
    #[from]
    Ledger(LedgerError),
}

impl std::error::Error for SyncError {}

/// Exact error kind, one per entry of the taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum ErrorKind {
    /// Packed or structured data violates its encoding.
    MalformedEncoding,
    /// A move log disagrees with itself or with the board.
    InconsistentHistory,
    /// Both actors own a triad.
    ImpossibleBoardState,
    /// Coordinates outside the board.
    OutOfBounds,
    /// Target cell already claimed.
    CellOccupied,
    /// Actor moved out of turn.
    OutOfTurn,
    /// Local precondition refused a submission.
    MoveRejectedLocally,
    /// Ledger refused or failed the move.
    MoveFailed,
    /// Ledger could not be reached.
    LedgerUnavailable,
}

/// How a caller recovers from an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Decode or evaluation failure: force a full reload.
    Decode,
    /// Local precondition violation: report, do not retry.
    LocalPrecondition,
    /// Confirmation failure: safe to resubmit the same move.
    Confirmation,
    /// Transport failure on a read: retry the read.
    Transport,
}

impl SyncError {
    /// The taxonomy entry for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::Codec(CodecError::MalformedEncoding(_)) => ErrorKind::MalformedEncoding,
            SyncError::Codec(CodecError::InconsistentHistory(_)) => ErrorKind::InconsistentHistory,
            SyncError::Rules(RulesError::ImpossibleBoardState) => ErrorKind::ImpossibleBoardState,
            SyncError::Move(e) | SyncError::MoveRejectedLocally(RejectReason::Illegal(e)) => {
                move_kind(e)
            }
            SyncError::MoveRejectedLocally(_) => ErrorKind::MoveRejectedLocally,
            SyncError::MoveFailed(_) => ErrorKind::MoveFailed,
            SyncError::Ledger(_) => ErrorKind::LedgerUnavailable,
        }
    }

    /// Recovery category for this error.
    pub fn category(&self) -> ErrorCategory {
        match self.kind() {
            ErrorKind::MalformedEncoding
            | ErrorKind::InconsistentHistory
            | ErrorKind::ImpossibleBoardState => ErrorCategory::Decode,
            ErrorKind::OutOfBounds
            | ErrorKind::CellOccupied
            | ErrorKind::OutOfTurn
            | ErrorKind::MoveRejectedLocally => ErrorCategory::LocalPrecondition,
            ErrorKind::MoveFailed => ErrorCategory::Confirmation,
            ErrorKind::LedgerUnavailable => ErrorCategory::Transport,
        }
    }

    /// True if a full reload of authoritative state is the recovery path.
    pub fn requires_reload(&self) -> bool {
        self.category() == ErrorCategory::Decode
    }

    /// Human-readable status line for this error.
    pub fn status(&self) -> String {
        match self.category() {
            ErrorCategory::Decode => {
                format!("Ledger data could not be reconciled ({}); reloading", self.kind())
            }
            ErrorCategory::LocalPrecondition => format!("Move not allowed: {}", self.detail()),
            ErrorCategory::Confirmation => "Move failed, try again".to_string(),
            ErrorCategory::Transport => "Ledger unreachable, retrying".to_string(),
        }
    }

    fn detail(&self) -> String {
        match self {
            SyncError::MoveRejectedLocally(reason) => reason.to_string(),
            other => other.to_string(),
        }
    }
}

fn move_kind(e: &MoveError) -> ErrorKind {
    match e {
        MoveError::OutOfBounds { .. } => ErrorKind::OutOfBounds,
        MoveError::CellOccupied(_) => ErrorKind::CellOccupied,
        MoveError::OutOfTurn { .. } => ErrorKind::OutOfTurn,
        MoveError::InvariantViolation(_) => ErrorKind::ImpossibleBoardState,
    }
}

/// A non-fatal disagreement between ledger data and local evaluation.
///
/// The authoritative value has already been chosen; the warning exists so the
/// disagreement is never silent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
#[display("{}", message)]
pub struct ConsistencyWarning {
    /// What disagreed.
    pub message: String,
}

impl ConsistencyWarning {
    /// Creates and logs a warning.
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        let message = message.into();
        let loc = std::panic::Location::caller();
        warn!(warning = %message, file = loc.file(), line = loc.line(), "Consistency warning");
        Self { message }
    }
}
