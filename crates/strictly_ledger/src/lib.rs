//! Strictly Ledger - tic-tac-toe state synchronized against an external ledger
//!
//! The ledger is the source of truth for every game. This crate keeps a local
//! view of it honest: boards are decoded from whatever shape the ledger
//! exposes, player moves are projected optimistically and committed exactly
//! once, and every disagreement with the ledger is surfaced rather than
//! silently resolved.
//!
//! # Architecture
//!
//! - **Codec**: packed, structured and history boards to one canonical [`Board`]
//! - **Rules**: pure win/tie evaluation
//! - **Contracts**: the move applier, with pre/postconditions
//! - **Machine**: the turn/outcome protocol and score tally
//! - **Reconcile**: ledger submission, normalization and observer snapshots
//!
//! # Example
//!
//! ```
//! use strictly_ledger::{Confirmation, GameMachine, Phase, Transition};
//!
//! let mut machine = GameMachine::new(1, "0xa11ce", "0xc0ffee");
//! let projection = machine.submit_player_move(1, 1)?;
//! let transition = machine.confirm(
//!     *projection.key(),
//!     Confirmation::Success { house_move: None, outcome: None },
//! )?;
//! assert!(matches!(transition, Transition::Committed(_)));
//! assert_eq!(machine.current_phase(), Phase::AwaitingHouseOutcome);
//! # Ok::<(), strictly_ledger::SyncError>(())
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod action;
mod codec;
mod contracts;
mod error;
mod ledger;
mod machine;
mod position;
mod receipt;
mod reconcile;
mod record;
pub mod rules;
mod types;

// Crate-level exports - Domain types
pub use action::{Move, MoveError};
pub use position::Position;
pub use types::{Actor, Board, Cell, GameId, Outcome};

// Crate-level exports - Codec
pub use codec::{
    CodecError, Decoded, Felt, HistoryEntry, RawBoard, StructuredCell, decode, encode_packed,
    parse_felt,
};

// Crate-level exports - Rules
pub use rules::RulesError;

// Crate-level exports - Move applier
pub use contracts::{ActorsTurn, CellIsEmpty, Contract, MoveContract, SingleCellDelta, Turn, apply};

// Crate-level exports - Errors
pub use error::{ConsistencyWarning, ErrorCategory, ErrorKind, RejectReason, SyncError};

// Crate-level exports - Ledger boundary
pub use ledger::{
    AuthoritativeState, Coords, Ledger, LedgerError, MoveReceipt, OutcomeFlags, is_zero_identity,
    same_identity,
};
pub use receipt::{
    EventRecord, ExecutionStatus, TransactionReceipt, normalize_move_receipt,
    started_game_id,
};

// Crate-level exports - State machine
pub use machine::{
    BoardView, Commit, Confirmation, GameMachine, MoveKey, Phase, Projection, Transition,
};
pub use record::{GameRecord, RecordedMove, ScoreTally, WinnerIdentity};

// Crate-level exports - Reconciliation
pub use reconcile::{Reconciler, Snapshot, normalize, outcome_from_flags};
