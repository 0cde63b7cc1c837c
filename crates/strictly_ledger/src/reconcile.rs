//! Optimistic reconciliation between the machine and the ledger.
//!
//! [`Reconciler`] projects a move, submits it, normalizes the receipt and
//! commits it exactly once. Observers follow along through a
//! [`tokio::sync::watch`] channel of [`Snapshot`]s.

use crate::error::{ConsistencyWarning, SyncError};
use crate::ledger::{Ledger, MoveReceipt, OutcomeFlags};
use crate::machine::{BoardView, Confirmation, GameMachine, MoveKey, Phase, Transition};
use crate::position::Position;
use crate::record::ScoreTally;
use crate::rules;
use crate::types::{Board, GameId, Outcome};
use derive_getters::Getters;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

/// What observers see after every state change.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct Snapshot {
    /// Game shown.
    game_id: GameId,
    /// Board to draw.
    view: BoardView,
    /// Protocol phase.
    phase: Phase,
    /// Committed outcome.
    outcome: Outcome,
    /// Session tally.
    tally: ScoreTally,
    /// Status line.
    status: String,
    /// Cells of the winning triad once a side has won.
    winning_line: Option<[Position; 3]>,
    /// Warnings raised by the step that produced this snapshot.
    warnings: Vec<ConsistencyWarning>,
}

impl Snapshot {
    fn of(machine: &GameMachine, warnings: Vec<ConsistencyWarning>) -> Self {
        let record = machine.record();
        let winning_line = record
            .outcome()
            .winner()
            .and_then(|_| rules::winning_line(record.board()));
        Self {
            game_id: *machine.record().game_id(),
            view: machine.view(),
            phase: machine.current_phase(),
            outcome: *machine.record().outcome(),
            tally: machine.score_tally(),
            status: machine.status().to_string(),
            winning_line,
            warnings,
        }
    }
}

/// Reduces terminal flags to an outcome.
///
/// More than one flag set is ambiguous and yields `None` with a warning, so
/// the local evaluator decides. No flag set means the game continues.
pub fn outcome_from_flags(flags: OutcomeFlags) -> (Option<Outcome>, Option<ConsistencyWarning>) {
    let set = [flags.winner_is_player, flags.winner_is_house, flags.is_tie]
        .iter()
        .filter(|f| **f)
        .count();
    match set {
        0 => (Some(Outcome::InProgress), None),
        1 if flags.winner_is_player => (Some(Outcome::PlayerWon), None),
        1 if flags.winner_is_house => (Some(Outcome::HouseWon), None),
        1 => (Some(Outcome::Tie), None),
        _ => (
            None,
            Some(ConsistencyWarning::new(format!(
                "ambiguous outcome flags {:?}, deferring to local evaluation",
                flags
            ))),
        ),
    }
}

/// Normalizes a ledger receipt into a [`Confirmation`].
///
/// Warnings raised while the receipt was read come first, followed by any
/// raised here.
pub fn normalize(receipt: &MoveReceipt) -> (Confirmation, Vec<ConsistencyWarning>) {
    let mut warnings = receipt.warnings.clone();
    if !receipt.transaction_confirmed {
        return (
            Confirmation::Failure("transaction not confirmed".to_string()),
            warnings,
        );
    }
    if let Some(reason) = &receipt.unreadable_reply {
        return (Confirmation::Unreadable(reason.clone()), warnings);
    }
    let (outcome, warning) = match receipt.outcome {
        Some(flags) => outcome_from_flags(flags),
        None => (None, None),
    };
    warnings.extend(warning);
    (
        Confirmation::Success {
            house_move: receipt.house_move,
            outcome,
        },
        warnings,
    )
}

/// Drives one [`GameMachine`] against a [`Ledger`].
///
/// The machine is locked only for synchronous sections, never across an
/// `.await`.
pub struct Reconciler<L> {
    ledger: Arc<L>,
    machine: Arc<Mutex<GameMachine>>,
    snapshots: watch::Sender<Snapshot>,
}

impl<L: Ledger> Reconciler<L> {
    /// Wraps an existing machine.
    pub fn new(ledger: Arc<L>, machine: GameMachine) -> Self {
        let (snapshots, _) = watch::channel(Snapshot::of(&machine, Vec::new()));
        Self {
            ledger,
            machine: Arc::new(Mutex::new(machine)),
            snapshots,
        }
    }

    /// Starts a new game on the ledger.
    ///
    /// # Errors
    ///
    /// [`SyncError::Ledger`] when the ledger cannot start a game.
    #[instrument(skip_all)]
    pub async fn start(
        ledger: Arc<L>,
        player_identity: impl Into<String>,
        house_identity: impl Into<String>,
    ) -> Result<Self, SyncError> {
        let game_id = ledger.start_game().await?;
        info!(game_id, "Started game");
        Ok(Self::new(
            ledger,
            GameMachine::new(game_id, player_identity, house_identity),
        ))
    }

    /// Opens an existing game from its authoritative state.
    ///
    /// # Errors
    ///
    /// [`SyncError::Ledger`] on transport failure, or any decode error.
    #[instrument(skip(ledger, house_identity))]
    pub async fn open(
        ledger: Arc<L>,
        game_id: GameId,
        house_identity: impl Into<String>,
    ) -> Result<Self, SyncError> {
        let state = ledger.fetch_authoritative_state(game_id).await?;
        let (machine, warnings) = GameMachine::load(game_id, &state, house_identity)?;
        let reconciler = Self::new(ledger, machine);
        reconciler.publish_with(warnings);
        Ok(reconciler)
    }

    fn lock(&self) -> MutexGuard<'_, GameMachine> {
        self.machine.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish_with(&self, warnings: Vec<ConsistencyWarning>) {
        let snapshot = Snapshot::of(&self.lock(), warnings);
        debug!(phase = %snapshot.phase, status = %snapshot.status, "Publishing snapshot");
        self.snapshots.send_replace(snapshot);
    }

    /// Submits a player move and reconciles the ledger's answer.
    ///
    /// # Errors
    ///
    /// - [`SyncError::MoveRejectedLocally`] when the move is refused before
    ///   submission
    /// - [`SyncError::MoveFailed`] when the ledger rejects it or cannot be
    ///   reached
    /// - decode errors when the house reply cannot be applied
    #[instrument(skip(self))]
    pub async fn play(&self, column: u64, row: u64) -> Result<Transition, SyncError> {
        let projection = self.lock().submit_player_move(column, row)?;
        self.publish_with(Vec::new());

        let key = *projection.key();
        let position = projection.player_move().position;
        let submitted = self
            .ledger
            .submit_move(key.game_id, position.column(), position.row())
            .await;

        let (confirmation, warnings) = match submitted {
            Ok(receipt) => normalize(&receipt),
            Err(e) => {
                error!(%key, error = %e, "Move submission failed");
                (Confirmation::Failure(e.message), Vec::new())
            }
        };
        self.reconcile(key, confirmation, warnings)
    }

    /// Delivers a receipt for `key`. Redeliveries are reported as
    /// [`Transition::Duplicate`].
    ///
    /// # Errors
    ///
    /// As [`GameMachine::confirm`].
    #[instrument(skip(self, receipt))]
    pub fn deliver(&self, key: MoveKey, receipt: &MoveReceipt) -> Result<Transition, SyncError> {
        let (confirmation, warnings) = normalize(receipt);
        self.reconcile(key, confirmation, warnings)
    }

    /// Confirms `key`; receipt warnings are folded into the commit so callers
    /// and observers see every disagreement of the step.
    fn reconcile(
        &self,
        key: MoveKey,
        confirmation: Confirmation,
        receipt_warnings: Vec<ConsistencyWarning>,
    ) -> Result<Transition, SyncError> {
        let mut result = self.lock().confirm(key, confirmation);
        let published = match &mut result {
            Ok(Transition::Committed(commit)) => {
                commit.prepend_warnings(receipt_warnings);
                commit.warnings().clone()
            }
            Ok(Transition::Duplicate(_)) => {
                debug!(%key, "Duplicate confirmation ignored");
                receipt_warnings
            }
            Err(e) => {
                warn!(%key, error = %e, status = %e.status(), "Confirmation not committed");
                receipt_warnings
            }
        };
        self.publish_with(published);
        result
    }

    /// Reloads the machine from the ledger's authoritative state.
    ///
    /// # Errors
    ///
    /// [`SyncError::Ledger`] on transport failure, or any decode error; the
    /// previous record is kept in both cases.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<Vec<ConsistencyWarning>, SyncError> {
        let game_id = *self.lock().record().game_id();
        let state = self.ledger.fetch_authoritative_state(game_id).await?;
        let result = self.lock().reload(&state);
        match &result {
            Ok(warnings) => self.publish_with(warnings.clone()),
            Err(_) => self.publish_with(Vec::new()),
        }
        result
    }

    /// Starts a new ledger game after the current one ended.
    ///
    /// # Errors
    ///
    /// [`SyncError::MoveRejectedLocally`] while the game is in progress, or
    /// [`SyncError::Ledger`] when the ledger cannot start a game.
    #[instrument(skip(self))]
    pub async fn rematch(&self) -> Result<GameId, SyncError> {
        if self.lock().current_phase() != Phase::Terminal {
            return Err(SyncError::MoveRejectedLocally(
                crate::error::RejectReason::GameInProgress,
            ));
        }
        let game_id = self.ledger.start_game().await?;
        self.lock().rematch(game_id)?;
        self.publish_with(Vec::new());
        Ok(game_id)
    }

    /// Receives every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshots.subscribe()
    }

    /// Latest snapshot.
    pub fn snapshot(&self) -> Snapshot {
        self.snapshots.borrow().clone()
    }

    /// Board to present.
    pub fn view(&self) -> BoardView {
        self.lock().view()
    }

    /// Committed board.
    pub fn current_board(&self) -> Board {
        self.lock().current_board()
    }

    /// Current phase.
    pub fn current_phase(&self) -> Phase {
        self.lock().current_phase()
    }

    /// Session tally.
    pub fn score_tally(&self) -> ScoreTally {
        self.lock().score_tally()
    }

    /// Status line.
    pub fn status(&self) -> &'static str {
        self.lock().status()
    }

    /// True until a successful reload.
    pub fn reload_required(&self) -> bool {
        self.lock().reload_required()
    }

    /// Game currently driven.
    pub fn game_id(&self) -> GameId {
        *self.lock().record().game_id()
    }

    /// Copy of the machine, for inspection.
    pub fn machine(&self) -> GameMachine {
        self.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::Coords;

    #[test]
    fn test_unconfirmed_receipt_is_failure() {
        let (confirmation, warnings) = normalize(&MoveReceipt::rejected());
        assert!(matches!(confirmation, Confirmation::Failure(_)));
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_all_false_flags_mean_in_progress() {
        let (outcome, warning) = outcome_from_flags(OutcomeFlags::default());
        assert_eq!(outcome, Some(Outcome::InProgress));
        assert!(warning.is_none());
    }

    #[test]
    fn test_ambiguous_flags_dropped_with_warning() {
        let receipt = MoveReceipt::confirmed(
            Some(Coords { column: 0, row: 0 }),
            Some(OutcomeFlags {
                winner_is_player: true,
                winner_is_house: false,
                is_tie: true,
            }),
        );
        let (confirmation, warnings) = normalize(&receipt);
        assert_eq!(
            confirmation,
            Confirmation::Success {
                house_move: Some(Coords { column: 0, row: 0 }),
                outcome: None,
            }
        );
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_single_flag_maps_to_outcome() {
        let flags = OutcomeFlags {
            winner_is_house: true,
            ..OutcomeFlags::default()
        };
        assert_eq!(outcome_from_flags(flags).0, Some(Outcome::HouseWon));
    }

    #[test]
    fn test_unreadable_receipt_is_not_a_failure() {
        let (confirmation, _) = normalize(&MoveReceipt::unreadable("missing `y`"));
        assert_eq!(
            confirmation,
            Confirmation::Unreadable("missing `y`".to_string())
        );
    }

    #[test]
    fn test_receipt_warnings_come_first() {
        let receipt = MoveReceipt {
            warnings: vec![ConsistencyWarning::new("legacy selector event")],
            ..MoveReceipt::confirmed(
                None,
                Some(OutcomeFlags {
                    winner_is_player: true,
                    winner_is_house: true,
                    is_tie: false,
                }),
            )
        };
        let (_, warnings) = normalize(&receipt);
        assert_eq!(warnings.len(), 2);
        assert_eq!(warnings[0].message, "legacy selector event");
    }
}
