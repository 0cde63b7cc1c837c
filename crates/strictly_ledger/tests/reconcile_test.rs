//! Exactly-once reconciliation, concurrency and recovery.

mod support;

use std::sync::Arc;
use strictly_ledger::{
    Actor, Cell, ConsistencyWarning, ErrorCategory, ErrorKind, GameMachine, MoveKey, MoveReceipt,
    OutcomeFlags, Phase, Position, Reconciler, RejectReason, SyncError, Transition,
};
use support::{HOUSE, OWNER, ScriptedLedger, confirmed, state};

#[tokio::test]
async fn test_redelivered_confirmation_is_duplicate() {
    let ledger = Arc::new(ScriptedLedger::new());
    ledger.push_receipt(confirmed(Some((2, 2)), None));
    let reconciler = Reconciler::new(ledger, GameMachine::new(1, OWNER, HOUSE));

    reconciler.play(0, 0).await.expect("move commits");
    // First submission of game 1.
    let key = MoveKey::new(1, 1);
    let moves_before = *reconciler.machine().record().total_moves_made();

    let again = reconciler
        .deliver(key, &confirmed(Some((2, 2)), None))
        .expect("duplicate is not an error");

    assert_eq!(again, Transition::Duplicate(key));
    assert_eq!(
        *reconciler.machine().record().total_moves_made(),
        moves_before
    );
}

#[tokio::test]
async fn test_concurrent_submission_rejected_while_pending() {
    let ledger = Arc::new(ScriptedLedger::gated());
    ledger.push_receipt(confirmed(None, None));
    let reconciler = Reconciler::new(ledger.clone(), GameMachine::new(2, OWNER, HOUSE));
    let mut snapshots = reconciler.subscribe();

    let (first, second) = tokio::join!(reconciler.play(0, 0), async {
        tokio::task::yield_now().await;
        let projected = snapshots.borrow_and_update().clone();
        let result = reconciler.play(1, 1).await;
        ledger.release();
        (projected, result)
    });

    first.expect("first move commits");
    let (projected, second) = second;
    assert!(projected.view().is_projected());
    assert_eq!(*projected.phase(), Phase::PendingConfirmation);
    assert_eq!(
        second.expect_err("second move refused"),
        SyncError::MoveRejectedLocally(RejectReason::ConfirmationPending)
    );
    assert_eq!(ledger.submitted(), vec![(2, 0, 0)]);
}

#[tokio::test]
async fn test_refresh_recovers_from_conflicting_house_move() {
    let ledger = Arc::new(ScriptedLedger::new());
    ledger.push_receipt(confirmed(Some((1, 1)), None));
    // Ledger truth: player centre, house top-left.
    ledger.push_state(state([2, 0, 0, 0, 1, 0, 0, 0, 0], true, None));
    let reconciler = Reconciler::new(ledger, GameMachine::new(3, OWNER, HOUSE));

    let err = reconciler.play(1, 1).await.expect_err("conflict");
    assert_eq!(err.category(), ErrorCategory::Decode);
    assert!(err.requires_reload());
    assert_eq!(reconciler.status(), "Reload required");

    let warnings = reconciler.refresh().await.expect("reload");
    assert!(warnings.is_empty());
    let board = reconciler.current_board();
    assert_eq!(board.get(Position::TopLeft), Cell::Occupied(Actor::House));
    assert_eq!(board.get(Position::Center), Cell::Occupied(Actor::Player));
    assert_eq!(reconciler.current_phase(), Phase::AwaitingPlayerMove);
}

#[tokio::test]
async fn test_refresh_picks_up_late_house_move() {
    let ledger = Arc::new(ScriptedLedger::new());
    ledger.push_receipt(confirmed(None, None));
    ledger.push_state(state([0, 0, 0, 0, 1, 0, 0, 0, 0], false, None));
    ledger.push_state(state([2, 0, 0, 0, 1, 0, 0, 0, 0], true, None));
    let reconciler = Reconciler::new(ledger, GameMachine::new(4, OWNER, HOUSE));

    reconciler.play(1, 1).await.expect("move commits");
    assert_eq!(reconciler.status(), "Computer's turn");

    reconciler.refresh().await.expect("still waiting");
    assert_eq!(reconciler.current_phase(), Phase::AwaitingHouseOutcome);

    reconciler.refresh().await.expect("house moved");
    assert_eq!(reconciler.current_phase(), Phase::AwaitingPlayerMove);
    assert_eq!(reconciler.status(), "Your turn");
}

#[tokio::test]
async fn test_refresh_transport_error_keeps_state() {
    let ledger = Arc::new(ScriptedLedger::new());
    let reconciler = Reconciler::new(ledger, GameMachine::new(5, OWNER, HOUSE));

    let err = reconciler.refresh().await.expect_err("no state scripted");
    assert_eq!(err.category(), ErrorCategory::Transport);
    assert_eq!(reconciler.current_phase(), Phase::AwaitingPlayerMove);
}

#[tokio::test]
async fn test_ambiguous_flags_fall_back_to_board() {
    let ledger = Arc::new(ScriptedLedger::new());
    ledger.push_receipt(confirmed(
        None,
        Some(OutcomeFlags {
            winner_is_player: true,
            winner_is_house: true,
            is_tie: false,
        }),
    ));
    let reconciler = Reconciler::new(ledger, GameMachine::new(6, OWNER, HOUSE));
    let snapshots = reconciler.subscribe();

    reconciler.play(0, 0).await.expect("move commits");

    assert_eq!(reconciler.current_phase(), Phase::AwaitingHouseOutcome);
    assert_eq!(snapshots.borrow().warnings().len(), 1);
}

#[tokio::test]
async fn test_rematch_keeps_tally() {
    let ledger = Arc::new(ScriptedLedger::new());
    ledger.push_game(10);
    ledger.push_receipt(confirmed(
        None,
        Some(OutcomeFlags {
            is_tie: true,
            ..OutcomeFlags::default()
        }),
    ));
    ledger.push_game(11);
    let reconciler = Reconciler::start(ledger, OWNER, HOUSE)
        .await
        .expect("start");
    assert_eq!(reconciler.game_id(), 10);

    assert!(matches!(
        reconciler.rematch().await,
        Err(SyncError::MoveRejectedLocally(RejectReason::GameInProgress))
    ));

    reconciler.play(1, 1).await.expect("move commits");
    assert_eq!(reconciler.current_phase(), Phase::Terminal);

    let next = reconciler.rematch().await.expect("rematch");
    assert_eq!(next, 11);
    assert_eq!(reconciler.game_id(), 11);
    assert_eq!(*reconciler.score_tally().ties(), 1);
    assert_eq!(reconciler.current_phase(), Phase::AwaitingPlayerMove);
}

#[tokio::test]
async fn test_unreadable_receipt_keeps_accepted_move() {
    let ledger = Arc::new(ScriptedLedger::new());
    ledger.push_receipt(MoveReceipt::unreadable(
        "event [\"ComputerMoved\"] is missing `y` at data[2]",
    ));
    // Player centre, house top-left.
    ledger.push_state(state([2, 0, 0, 0, 1, 0, 0, 0, 0], true, None));
    let reconciler = Reconciler::new(ledger, GameMachine::new(1, OWNER, HOUSE));

    let err = reconciler.play(1, 1).await.expect_err("unreadable reply");

    assert_eq!(err.kind(), ErrorKind::MalformedEncoding);
    assert!(err.requires_reload());
    assert_eq!(reconciler.status(), "Reload required");
    assert_eq!(
        reconciler.current_board().get(Position::Center),
        Cell::Occupied(Actor::Player)
    );
    assert_eq!(
        reconciler.play(0, 0).await.expect_err("reload first"),
        SyncError::MoveRejectedLocally(RejectReason::ReloadRequired)
    );

    reconciler.refresh().await.expect("reload");
    assert_eq!(reconciler.current_phase(), Phase::AwaitingPlayerMove);
    assert_eq!(
        reconciler.current_board().get(Position::TopLeft),
        Cell::Occupied(Actor::House)
    );
}

#[tokio::test]
async fn test_receipt_warnings_reach_commit_and_snapshot() {
    let ledger = Arc::new(ScriptedLedger::new());
    ledger.push_receipt(MoveReceipt {
        warnings: vec![ConsistencyWarning::new(
            "ignoring contract event with unrecognized keys [\"0x1dcde\"]",
        )],
        ..confirmed(Some((0, 0)), None)
    });
    let reconciler = Reconciler::new(ledger, GameMachine::new(1, OWNER, HOUSE));
    let mut snapshots = reconciler.subscribe();

    let transition = reconciler.play(1, 1).await.expect("move commits");

    let Transition::Committed(commit) = transition else {
        panic!("expected commit");
    };
    assert_eq!(commit.warnings().len(), 1);
    assert!(snapshots.has_changed().expect("sender alive"));
    let snapshot = snapshots.borrow_and_update().clone();
    assert_eq!(snapshot.warnings(), commit.warnings());
    assert!(snapshot.warnings()[0].message.contains("unrecognized keys"));
}

#[tokio::test]
async fn test_snapshot_names_winning_line() {
    let ledger = Arc::new(ScriptedLedger::new());
    ledger.push_state(state([1, 1, 0, 2, 2, 0, 0, 0, 0], true, None));
    ledger.push_receipt(confirmed(None, None));
    let reconciler = Reconciler::open(ledger, 2, HOUSE).await.expect("open");
    assert_eq!(*reconciler.snapshot().winning_line(), None);

    reconciler.play(2, 0).await.expect("move commits");

    assert_eq!(
        *reconciler.snapshot().winning_line(),
        Some([Position::TopLeft, Position::TopCenter, Position::TopRight])
    );
}
