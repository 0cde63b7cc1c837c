//! Turn/outcome state machine.
//!
//! Owns the committed [`GameRecord`] of one game and the score tally of the
//! session. A player move goes through a two-step protocol:
//!
//! 1. [`GameMachine::submit_player_move`] validates the move and returns a
//!    [`Projection`] keyed by a fresh [`MoveKey`].
//! 2. [`GameMachine::confirm`] consumes the ledger's [`Confirmation`] for that
//!    key exactly once and commits or discards the projection.
//!
//! ```text
//! AwaitingPlayerMove ──submit──> PendingConfirmation
//!        ^                          │ failure: back to AwaitingPlayerMove
//!        │ house move               v success
//!        └──────────── AwaitingHouseOutcome | Terminal (absorbing)
//! ```

use crate::action::{Move, MoveError};
use crate::codec::{self, CodecError};
use crate::contracts;
use crate::error::{ConsistencyWarning, RejectReason, SyncError};
use crate::ledger::{AuthoritativeState, Coords, is_zero_identity, same_identity};
use crate::record::{GameRecord, ScoreTally, WinnerIdentity};
use crate::rules;
use crate::types::{Actor, Board, GameId, Outcome};
use derive_getters::Getters;
use derive_new::new;
use tracing::{debug, info, instrument, warn};

/// Where a game stands in the commit protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum Phase {
    /// The player may submit a move.
    #[display("awaiting player move")]
    AwaitingPlayerMove,
    /// A move was submitted and the ledger has not answered.
    #[display("pending confirmation")]
    PendingConfirmation,
    /// The player move is committed; the house has not replied yet.
    #[display("awaiting house outcome")]
    AwaitingHouseOutcome,
    /// The game is over.
    #[display("terminal")]
    Terminal,
}

/// Identity of one submission: game id plus a per-machine sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, new, derive_more::Display)]
#[display("game {}#{}", game_id, seq)]
pub struct MoveKey {
    /// Game the submission belongs to.
    pub game_id: GameId,
    /// Submission counter.
    pub seq: u64,
}

/// Local shadow of the board while a move awaits confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct Projection {
    /// Submission this projection belongs to.
    key: MoveKey,
    /// Committed board plus the player's move.
    board: Board,
    /// Turn holder once the move lands.
    next_turn: Actor,
    /// The projected move.
    player_move: Move,
}

/// Normalized ledger answer to a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Confirmation {
    /// The ledger did not accept the move.
    Failure(String),
    /// The ledger accepted the move.
    Success {
        /// House reply included in the same transaction.
        house_move: Option<Coords>,
        /// Terminal status reported by the ledger, if any.
        outcome: Option<Outcome>,
    },
    /// The ledger accepted the move but the rest of its answer could not be
    /// read.
    Unreadable(String),
}

/// State committed by a confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct Commit {
    /// Committed board after the confirmation.
    board: Board,
    /// Phase after the confirmation.
    phase: Phase,
    /// Outcome after the confirmation.
    outcome: Outcome,
    /// House move applied in the same step.
    house_move: Option<Move>,
    /// Disagreements resolved in favour of the ledger.
    warnings: Vec<ConsistencyWarning>,
}

impl Commit {
    pub(crate) fn prepend_warnings(&mut self, earlier: Vec<ConsistencyWarning>) {
        self.warnings.splice(0..0, earlier);
    }
}

/// Result of delivering a confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// The confirmation was applied.
    Committed(Commit),
    /// The key is not outstanding; nothing changed.
    Duplicate(MoveKey),
}

/// What a presentation layer may draw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardView {
    /// The authoritative board.
    Committed(Board),
    /// A board that includes an unconfirmed player move.
    Projected(Projection),
}

impl BoardView {
    /// The board to draw, whichever kind it is.
    pub fn board(&self) -> Board {
        match self {
            BoardView::Committed(board) => *board,
            BoardView::Projected(projection) => projection.board,
        }
    }

    /// True while the board is not authoritative.
    pub fn is_projected(&self) -> bool {
        matches!(self, BoardView::Projected(_))
    }
}

/// State machine for one game.
#[derive(Debug, Clone)]
pub struct GameMachine {
    record: GameRecord,
    house_identity: String,
    phase: Phase,
    projection: Option<Projection>,
    next_seq: u64,
    reload_required: bool,
    unresolved_house_move: Option<Coords>,
    last_failure: Option<String>,
    tally: ScoreTally,
}

struct Interpreted {
    board: Board,
    total_moves_made: u8,
    next_turn: Actor,
    outcome: Outcome,
    winner: Option<WinnerIdentity>,
    warnings: Vec<ConsistencyWarning>,
}

impl GameMachine {
    /// Creates a machine for a freshly started game.
    #[instrument(skip(board_owner, house_identity))]
    pub fn new(
        game_id: GameId,
        board_owner: impl Into<String>,
        house_identity: impl Into<String>,
    ) -> Self {
        Self {
            record: GameRecord::new(game_id, board_owner),
            house_identity: house_identity.into(),
            phase: Phase::AwaitingPlayerMove,
            projection: None,
            next_seq: 0,
            reload_required: false,
            unresolved_house_move: None,
            last_failure: None,
            tally: ScoreTally::default(),
        }
    }

    /// Builds a machine from the ledger's view of an existing game.
    ///
    /// A game that is already over is not counted in the tally.
    ///
    /// # Errors
    ///
    /// Any decode or evaluation error; no machine is produced.
    #[instrument(skip(state, house_identity))]
    pub fn load(
        game_id: GameId,
        state: &AuthoritativeState,
        house_identity: impl Into<String>,
    ) -> Result<(Self, Vec<ConsistencyWarning>), SyncError> {
        let house_identity = house_identity.into();
        let interpreted = interpret(game_id, state, &house_identity)?;
        let mut machine = Self::new(game_id, state.player_identity.clone(), house_identity);
        let warnings = machine.install(interpreted);
        info!(game_id, phase = %machine.phase, "Game loaded");
        Ok((machine, warnings))
    }

    /// Replaces the record with the ledger's view.
    ///
    /// Any outstanding projection is discarded and its key retired. On error
    /// the previous record is kept and a reload stays required.
    ///
    /// # Errors
    ///
    /// Any decode or evaluation error.
    #[instrument(skip(self, state), fields(game_id = self.record.game_id()))]
    pub fn reload(
        &mut self,
        state: &AuthoritativeState,
    ) -> Result<Vec<ConsistencyWarning>, SyncError> {
        if let Some(stale) = self.projection.take() {
            warn!(key = %stale.key, "Discarding unconfirmed projection on reload");
        }

        let interpreted = match interpret(*self.record.game_id(), state, &self.house_identity) {
            Ok(interpreted) => interpreted,
            Err(e) => {
                warn!(error = %e, "Reload failed, keeping previous record");
                self.reload_required = true;
                self.phase = self.settled_phase();
                return Err(e);
            }
        };

        if self.record.is_terminal() {
            let mut warnings = interpreted.warnings;
            if interpreted.outcome != *self.record.outcome() {
                warnings.push(ConsistencyWarning::new(format!(
                    "ledger reports {} for a game already recorded as {}",
                    interpreted.outcome,
                    self.record.outcome()
                )));
            }
            self.reload_required = false;
            self.unresolved_house_move = None;
            self.phase = Phase::Terminal;
            return Ok(warnings);
        }

        let warnings = self.install(interpreted);
        if self.record.is_terminal() {
            self.tally.record(*self.record.outcome());
        }
        info!(phase = %self.phase, moves = self.record.total_moves_made(), "Reloaded from ledger");
        Ok(warnings)
    }

    /// Starts a fresh record for `game_id`, keeping the tally.
    ///
    /// # Errors
    ///
    /// [`RejectReason::GameInProgress`] unless the current game is over.
    #[instrument(skip(self), fields(previous = self.record.game_id()))]
    pub fn rematch(&mut self, game_id: GameId) -> Result<(), SyncError> {
        if self.phase != Phase::Terminal {
            return Err(SyncError::MoveRejectedLocally(RejectReason::GameInProgress));
        }
        self.record = GameRecord::new(game_id, self.record.board_owner().clone());
        self.phase = Phase::AwaitingPlayerMove;
        self.projection = None;
        self.reload_required = false;
        self.unresolved_house_move = None;
        self.last_failure = None;
        info!(game_id, "Rematch started");
        Ok(())
    }

    /// Validates a player move and projects it.
    ///
    /// # Errors
    ///
    /// [`SyncError::MoveRejectedLocally`] when the phase, a pending reload or
    /// the move itself forbids it. The machine is unchanged.
    #[instrument(skip(self), fields(game_id = self.record.game_id(), phase = %self.phase))]
    pub fn submit_player_move(&mut self, column: u64, row: u64) -> Result<Projection, SyncError> {
        if let Err(reason) = self.check_can_submit() {
            warn!(%reason, "Move rejected locally");
            return Err(SyncError::MoveRejectedLocally(reason));
        }

        let game_id = *self.record.game_id();
        let board = self.record.board();
        let projected = Move::from_coords(game_id, column, row, Actor::Player)
            .and_then(|mov| {
                contracts::apply(board, &mov, *self.record.next_turn()).map(|b| (mov, b))
            })
            .map_err(|e| {
                warn!(error = %e, "Move rejected locally");
                SyncError::MoveRejectedLocally(RejectReason::Illegal(e))
            })?;
        let (player_move, board) = projected;

        self.next_seq += 1;
        let projection = Projection {
            key: MoveKey::new(game_id, self.next_seq),
            board,
            next_turn: Actor::House,
            player_move,
        };
        self.projection = Some(projection.clone());
        self.phase = Phase::PendingConfirmation;
        self.last_failure = None;
        info!(key = %projection.key, position = %player_move.position, "Move projected");
        Ok(projection)
    }

    fn check_can_submit(&self) -> Result<(), RejectReason> {
        if self.reload_required {
            return Err(RejectReason::ReloadRequired);
        }
        match self.phase {
            Phase::Terminal => Err(RejectReason::GameOver(*self.record.outcome())),
            Phase::PendingConfirmation => Err(RejectReason::ConfirmationPending),
            Phase::AwaitingHouseOutcome => Err(RejectReason::AwaitingHouse),
            Phase::AwaitingPlayerMove if self.projection.is_some() => {
                Err(RejectReason::ConfirmationPending)
            }
            Phase::AwaitingPlayerMove => Ok(()),
        }
    }

    /// Applies the confirmation for `key`.
    ///
    /// A key that is not outstanding yields [`Transition::Duplicate`] and
    /// leaves everything untouched.
    ///
    /// # Errors
    ///
    /// - [`SyncError::MoveFailed`] for a failure confirmation; the projection
    ///   is discarded
    /// - [`CodecError::InconsistentHistory`] when the house move lands on a
    ///   taken cell; the player move stays committed and a reload is required
    /// - [`CodecError::MalformedEncoding`] when the house move is off the board
    ///   or the ledger's reply was unreadable; the player move stays committed
    ///   and a reload is required
    /// - [`rules::RulesError::ImpossibleBoardState`] when the committed board
    ///   cannot be evaluated
    #[instrument(skip(self, confirmation), fields(game_id = self.record.game_id()))]
    pub fn confirm(
        &mut self,
        key: MoveKey,
        confirmation: Confirmation,
    ) -> Result<Transition, SyncError> {
        let projection = match self.projection.take() {
            Some(projection) if projection.key == key => projection,
            other => {
                self.projection = other;
                debug!(%key, "Confirmation for a key that is not outstanding");
                return Ok(Transition::Duplicate(key));
            }
        };

        let (house_move, carried) = match confirmation {
            Confirmation::Failure(reason) => {
                warn!(%key, %reason, "Ledger rejected move, rolling back");
                self.phase = Phase::AwaitingPlayerMove;
                self.last_failure = Some(reason.clone());
                return Err(SyncError::MoveFailed(reason));
            }
            Confirmation::Success {
                house_move,
                outcome,
            } => (house_move, outcome),
            Confirmation::Unreadable(reason) => {
                self.record
                    .commit_move(projection.player_move, projection.board);
                warn!(%key, %reason, "Player move committed, ledger reply unreadable, reload required");
                self.reload_required = true;
                self.phase = self.settled_phase();
                return Err(CodecError::MalformedEncoding(reason).into());
            }
        };

        self.record
            .commit_move(projection.player_move, projection.board);
        debug!(%key, "Player move committed");

        let house = match house_move {
            Some(coords) => Some(self.commit_house_move(coords)?),
            None => None,
        };

        let mut warnings = Vec::new();
        let local = rules::evaluate(self.record.board());
        let outcome = match carried {
            Some(reported) => {
                match local {
                    Ok(local) if local != reported => {
                        warnings.push(ConsistencyWarning::new(format!(
                            "ledger reports {} but the board evaluates to {}",
                            reported, local
                        )));
                    }
                    Err(e) => {
                        warnings.push(ConsistencyWarning::new(format!(
                            "ledger reports {} for a board that cannot be evaluated: {}",
                            reported, e
                        )));
                    }
                    Ok(_) => {}
                }
                reported
            }
            None => match local {
                Ok(local) => local,
                Err(e) => {
                    self.reload_required = true;
                    self.phase = self.settled_phase();
                    return Err(e.into());
                }
            },
        };

        if outcome.is_terminal() {
            self.record.finish(outcome, &self.house_identity);
            self.tally.record(outcome);
            info!(%outcome, tally = %self.tally, "Game finished");
        }
        self.phase = self.settled_phase();
        info!(%key, phase = %self.phase, "Confirmation applied");

        Ok(Transition::Committed(Commit {
            board: *self.record.board(),
            phase: self.phase,
            outcome,
            house_move: house,
            warnings,
        }))
    }

    fn commit_house_move(&mut self, coords: Coords) -> Result<Move, SyncError> {
        let game_id = *self.record.game_id();
        let applied = Move::from_coords(game_id, coords.column, coords.row, Actor::House)
            .and_then(|mov| {
                contracts::apply(self.record.board(), &mov, Actor::House).map(|b| (mov, b))
            });
        match applied {
            Ok((mov, board)) => {
                self.record.commit_move(mov, board);
                debug!(position = %mov.position, "House move committed");
                Ok(mov)
            }
            Err(e) => {
                warn!(error = %e, ?coords, "House move cannot be applied, reload required");
                self.unresolved_house_move = Some(coords);
                self.reload_required = true;
                self.phase = self.settled_phase();
                let err = match e {
                    MoveError::OutOfBounds { .. } => CodecError::MalformedEncoding(format!(
                        "house move {}:{} is off the board",
                        coords.column, coords.row
                    )),
                    other => CodecError::InconsistentHistory(format!(
                        "house move {}:{} conflicts with the committed board: {}",
                        coords.column, coords.row, other
                    )),
                };
                Err(err.into())
            }
        }
    }

    fn settled_phase(&self) -> Phase {
        if self.record.is_terminal() {
            Phase::Terminal
        } else {
            match self.record.next_turn() {
                Actor::Player => Phase::AwaitingPlayerMove,
                Actor::House => Phase::AwaitingHouseOutcome,
            }
        }
    }

    fn install(&mut self, interpreted: Interpreted) -> Vec<ConsistencyWarning> {
        self.record.replace(
            interpreted.board,
            interpreted.total_moves_made,
            interpreted.next_turn,
            interpreted.outcome,
            interpreted.winner,
        );
        self.projection = None;
        self.reload_required = false;
        self.unresolved_house_move = None;
        self.last_failure = None;
        self.phase = self.settled_phase();
        interpreted.warnings
    }

    /// Committed board.
    pub fn current_board(&self) -> Board {
        *self.record.board()
    }

    /// Current phase.
    pub fn current_phase(&self) -> Phase {
        self.phase
    }

    /// Session tally.
    pub fn score_tally(&self) -> ScoreTally {
        self.tally
    }

    /// Committed record.
    pub fn record(&self) -> &GameRecord {
        &self.record
    }

    /// Outstanding projection, if any.
    pub fn projection(&self) -> Option<&Projection> {
        self.projection.as_ref()
    }

    /// True until a successful reload.
    pub fn reload_required(&self) -> bool {
        self.reload_required
    }

    /// House move that could not be applied.
    pub fn unresolved_house_move(&self) -> Option<Coords> {
        self.unresolved_house_move
    }

    /// Identity the ledger uses for the house.
    pub fn house_identity(&self) -> &str {
        &self.house_identity
    }

    /// Board to present: the projection while one is outstanding.
    pub fn view(&self) -> BoardView {
        match &self.projection {
            Some(projection) => BoardView::Projected(projection.clone()),
            None => BoardView::Committed(*self.record.board()),
        }
    }

    /// One-line status for the player.
    pub fn status(&self) -> &'static str {
        if self.reload_required {
            return "Reload required";
        }
        match self.phase {
            Phase::Terminal => match self.record.outcome() {
                Outcome::PlayerWon => "You win!",
                Outcome::HouseWon => "Computer wins!",
                Outcome::Tie | Outcome::InProgress => "It's a tie!",
            },
            Phase::PendingConfirmation => "Submitting move to ledger...",
            Phase::AwaitingHouseOutcome => "Computer's turn",
            Phase::AwaitingPlayerMove if self.last_failure.is_some() => "Move failed, try again",
            Phase::AwaitingPlayerMove => "Your turn",
        }
    }
}

/// Reads an authoritative snapshot into record fields.
///
/// A non-zero winner identity is authoritative. Without one, the local
/// evaluation decides and a terminal evaluation is reported as a warning.
fn interpret(
    game_id: GameId,
    state: &AuthoritativeState,
    house_identity: &str,
) -> Result<Interpreted, SyncError> {
    let decoded = codec::decode(&state.raw_board, game_id)?;
    let board = decoded.board;
    let mut warnings = decoded.warnings;
    let local = rules::evaluate(&board)?;

    let recorded_winner = state
        .winner_identity
        .as_deref()
        .filter(|w| !is_zero_identity(w));

    let (outcome, winner) = match recorded_winner {
        Some(address) => {
            let outcome = if same_identity(address, &state.player_identity) {
                Outcome::PlayerWon
            } else {
                Outcome::HouseWon
            };
            if local != outcome {
                warnings.push(ConsistencyWarning::new(format!(
                    "ledger winner {} implies {} but the board evaluates to {}",
                    address, outcome, local
                )));
            }
            (outcome, Some(WinnerIdentity::Address(address.to_string())))
        }
        None => {
            let winner = match local {
                Outcome::InProgress => None,
                Outcome::Tie => Some(WinnerIdentity::NoWinner),
                Outcome::PlayerWon => {
                    Some(WinnerIdentity::Address(state.player_identity.clone()))
                }
                Outcome::HouseWon => Some(WinnerIdentity::Address(house_identity.to_string())),
            };
            if matches!(local, Outcome::PlayerWon | Outcome::HouseWon) {
                warnings.push(ConsistencyWarning::new(format!(
                    "board evaluates to {} but the ledger has no winner recorded",
                    local
                )));
            }
            (local, winner)
        }
    };

    let next_turn = if state.is_player_turn {
        Actor::Player
    } else {
        Actor::House
    };
    let expected_turn = if board.count(Actor::Player) > board.count(Actor::House) {
        Actor::House
    } else {
        Actor::Player
    };
    if !outcome.is_terminal() && next_turn != expected_turn {
        warnings.push(ConsistencyWarning::new(format!(
            "ledger gives the turn to {:?} but the board implies {:?}",
            next_turn, expected_turn
        )));
    }
    if usize::from(state.total_moves_made) != board.occupied() {
        warnings.push(ConsistencyWarning::new(format!(
            "ledger counts {} moves but the board holds {}",
            state.total_moves_made,
            board.occupied()
        )));
    }

    Ok(Interpreted {
        board,
        total_moves_made: state.total_moves_made,
        next_turn,
        outcome,
        winner,
        warnings,
    })
}
