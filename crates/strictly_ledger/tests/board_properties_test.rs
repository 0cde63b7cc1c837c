//! Properties over every reachable board and many full games.

use std::collections::HashSet;
use strictly_ledger::{
    Actor, Board, Confirmation, Coords, Felt, GameMachine, Move, Outcome, Phase, Position,
    RawBoard, SingleCellDelta, apply, decode, encode_packed, rules,
};

const OWNER: &str = "0xa11ce";
const HOUSE: &str = "0xc0ffee";

/// Every board reachable by alternating play that stops at the first result.
fn reachable_boards() -> HashSet<Board> {
    let mut seen = HashSet::new();
    let mut stack = vec![(Board::new(), Actor::Player)];
    while let Some((board, to_move)) = stack.pop() {
        if !seen.insert(board) {
            continue;
        }
        if rules::evaluate(&board).expect("reachable").is_terminal() {
            continue;
        }
        for position in Position::valid_moves(&board) {
            let mov = Move::new(1, position, to_move);
            let next = apply(&board, &mov, to_move).expect("empty cell");
            stack.push((next, to_move.opponent()));
        }
    }
    seen
}

#[test]
fn test_reachable_board_count() {
    assert_eq!(reachable_boards().len(), 5478);
}

#[test]
fn test_packed_round_trip_for_reachable_boards() {
    for board in reachable_boards() {
        let packed = encode_packed(&board);
        let decoded = decode(&RawBoard::Packed(Felt::Number(u64::from(packed))), 1)
            .expect("reachable board decodes");
        assert_eq!(decoded.board, board);
        assert!(decoded.warnings.is_empty(), "{:?}", decoded.warnings);

        let hex = RawBoard::Packed(Felt::Text(format!("{:#x}", packed)));
        assert_eq!(decode(&hex, 1).expect("hex felt").board, board);
    }
}

#[test]
fn test_applier_changes_exactly_one_cell() {
    for board in reachable_boards() {
        if rules::evaluate(&board).expect("reachable").is_terminal() {
            continue;
        }
        let to_move = if board.count(Actor::Player) > board.count(Actor::House) {
            Actor::House
        } else {
            Actor::Player
        };
        for position in Position::valid_moves(&board) {
            let mov = Move::new(1, position, to_move);
            let after = apply(&board, &mov, to_move).expect("empty cell");
            assert!(SingleCellDelta::holds(&board, &after, &mov));
            assert_eq!(after.occupied(), board.occupied() + 1);
        }
    }
}

struct XorShift(u64);

impl XorShift {
    fn next(&mut self) -> u64 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        self.0
    }

    fn shuffled(&mut self) -> [Position; 9] {
        let mut order = Position::ALL;
        for i in (1..order.len()).rev() {
            let j = (self.next() % (i as u64 + 1)) as usize;
            order.swap(i, j);
        }
        order
    }
}

fn coords(position: Position) -> Coords {
    Coords {
        column: u64::from(position.column()),
        row: u64::from(position.row()),
    }
}

/// Plays `order` with the player on even slots; the house replies inside the
/// same confirmation unless the player's move ended the game.
fn play_out(order: &[Position; 9]) -> (GameMachine, usize) {
    let mut machine = GameMachine::new(1, OWNER, HOUSE);
    let mut played = 0;
    let mut moves = order.iter().copied();
    while let Some(player) = moves.next() {
        let projection = machine
            .submit_player_move(coords(player).column, coords(player).row)
            .expect("empty cell");
        played += 1;
        let house = if rules::evaluate(projection.board())
            .expect("legal board")
            .is_terminal()
        {
            None
        } else {
            moves.next().map(coords)
        };
        if house.is_some() {
            played += 1;
        }
        machine
            .confirm(
                *projection.key(),
                Confirmation::Success {
                    house_move: house,
                    outcome: None,
                },
            )
            .expect("legal sequence");
        if machine.current_phase() == Phase::Terminal {
            break;
        }
    }
    (machine, played)
}

#[test]
fn test_move_sequences_count_every_move() {
    let mut rng = XorShift(0x9e37_79b9_7f4a_7c15);
    let mut full_games = 0;
    for _ in 0..2000 {
        let order = rng.shuffled();
        let (machine, played) = play_out(&order);
        let record = machine.record();

        assert_eq!(usize::from(*record.total_moves_made()), played);
        assert_eq!(machine.current_board().occupied(), played);
        assert_eq!(machine.current_phase(), Phase::Terminal);
        assert!(rules::evaluate(&machine.current_board()).is_ok());
        assert_eq!(
            Ok(*record.outcome()),
            rules::evaluate(&machine.current_board())
        );
        if played == 9 {
            full_games += 1;
            assert_ne!(*record.outcome(), Outcome::InProgress);
        }
    }
    assert!(full_games > 0);
}

#[test]
fn test_each_finished_game_counts_once_in_tally() {
    let mut rng = XorShift(0x2545_f491_4f6c_dd1d);
    for order in std::iter::once(Position::ALL).chain((0..200).map(|_| rng.shuffled())) {
        let (machine, _) = play_out(&order);
        let tally = machine.score_tally();

        assert_eq!(tally.games(), 1);
        let slot = match *machine.record().outcome() {
            Outcome::PlayerWon => *tally.player_wins(),
            Outcome::HouseWon => *tally.house_wins(),
            Outcome::Tie => *tally.ties(),
            Outcome::InProgress => panic!("game left unfinished"),
        };
        assert_eq!(slot, 1);
    }
}
