//! In-process ledger with a built-in house opponent.
//!
//! Stands in for the gateway during offline play and tests. It keeps the
//! authoritative games itself, validates every player move, and answers with
//! the house reply and terminal outcome the way the contract does.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use strictly_ledger::{
    Actor, AuthoritativeState, Board, Cell, Coords, Felt, GameId, Ledger, LedgerError, Move,
    MoveReceipt, Outcome, OutcomeFlags, Position, RawBoard, apply, encode_packed, rules,
};
use tracing::{debug, info, instrument, warn};

/// Picks the house reply: win, else block, else centre, else first empty.
pub fn pick_move(board: &Board) -> Option<Position> {
    completing_cell(board, Actor::House)
        .or_else(|| completing_cell(board, Actor::Player))
        .or_else(|| board.is_empty(Position::Center).then_some(Position::Center))
        .or_else(|| Position::ALL.iter().copied().find(|&pos| board.is_empty(pos)))
}

/// First empty cell that would complete a line for `actor`.
fn completing_cell(board: &Board, actor: Actor) -> Option<Position> {
    rules::LINES.iter().find_map(|line| {
        let owned = line
            .iter()
            .filter(|&&pos| board.get(pos) == Cell::Occupied(actor))
            .count();
        let empty: Vec<Position> = line.iter().copied().filter(|&pos| board.is_empty(pos)).collect();
        match (owned, empty.as_slice()) {
            (2, [cell]) => Some(*cell),
            _ => None,
        }
    })
}

fn flags(outcome: Outcome) -> OutcomeFlags {
    OutcomeFlags {
        winner_is_player: outcome == Outcome::PlayerWon,
        winner_is_house: outcome == Outcome::HouseWon,
        is_tie: outcome == Outcome::Tie,
    }
}

fn coords(position: Position) -> Coords {
    Coords {
        column: u64::from(position.column()),
        row: u64::from(position.row()),
    }
}

#[derive(Debug, Clone)]
struct HouseGame {
    board: Board,
    moves: u8,
    to_move: Actor,
    outcome: Outcome,
}

impl HouseGame {
    fn new() -> Self {
        Self {
            board: Board::new(),
            moves: 0,
            to_move: Actor::Player,
            outcome: Outcome::InProgress,
        }
    }

    fn place(&mut self, game_id: GameId, position: Position, actor: Actor) -> Result<(), LedgerError> {
        let mov = Move::new(game_id, position, actor);
        self.board = apply(&self.board, &mov, self.to_move)
            .map_err(|e| LedgerError::new(format!("Move refused: {}", e)))?;
        self.moves += 1;
        self.to_move = actor.opponent();
        self.outcome = rules::evaluate(&self.board)
            .map_err(|e| LedgerError::new(format!("Board corrupted: {}", e)))?;
        Ok(())
    }

    /// Plays the house reply if it is the house's turn.
    fn reply(&mut self, game_id: GameId) -> Result<Option<Position>, LedgerError> {
        if self.outcome.is_terminal() || self.to_move != Actor::House {
            return Ok(None);
        }
        let Some(position) = pick_move(&self.board) else {
            return Ok(None);
        };
        self.place(game_id, position, Actor::House)?;
        debug!(%position, "House replied");
        Ok(Some(position))
    }
}

#[derive(Debug, Default)]
struct Games {
    next_id: GameId,
    games: HashMap<GameId, HouseGame>,
}

/// A [`Ledger`] that plays the house itself.
#[derive(Debug)]
pub struct HouseLedger {
    player_identity: String,
    house_identity: String,
    deferred_replies: bool,
    games: Mutex<Games>,
}

impl HouseLedger {
    /// Creates a house ledger whose replies arrive inside the move receipt.
    #[instrument(skip_all)]
    pub fn new(player_identity: impl Into<String>, house_identity: impl Into<String>) -> Self {
        info!("Creating in-process house ledger");
        Self {
            player_identity: player_identity.into(),
            house_identity: house_identity.into(),
            deferred_replies: false,
            games: Mutex::new(Games {
                next_id: 1,
                games: HashMap::new(),
            }),
        }
    }

    /// Makes the house answer on the next state query instead of in the
    /// receipt, like a ledger that settles the reply in a later block.
    pub fn with_deferred_replies(mut self, deferred: bool) -> Self {
        self.deferred_replies = deferred;
        self
    }

    fn lock(&self) -> MutexGuard<'_, Games> {
        self.games.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn winner_identity(&self, outcome: Outcome) -> String {
        match outcome {
            Outcome::PlayerWon => self.player_identity.clone(),
            Outcome::HouseWon => self.house_identity.clone(),
            Outcome::InProgress | Outcome::Tie => "0x0".to_string(),
        }
    }
}

#[async_trait::async_trait]
impl Ledger for HouseLedger {
    #[instrument(skip(self))]
    async fn submit_move(
        &self,
        game_id: GameId,
        column: u8,
        row: u8,
    ) -> Result<MoveReceipt, LedgerError> {
        let mut games = self.lock();
        let game = games
            .games
            .get_mut(&game_id)
            .ok_or_else(|| LedgerError::new(format!("Unknown game {}", game_id)))?;

        let Some(position) = Position::from_coords(u64::from(column), u64::from(row)) else {
            warn!("Coordinates off the board, reverting");
            return Ok(MoveReceipt::rejected());
        };
        if game.outcome.is_terminal() || game.to_move != Actor::Player {
            warn!(outcome = %game.outcome, "Move out of turn, reverting");
            return Ok(MoveReceipt::rejected());
        }
        if let Err(e) = game.place(game_id, position, Actor::Player) {
            warn!(error = %e, "Move refused, reverting");
            return Ok(MoveReceipt::rejected());
        }

        let house_move = if self.deferred_replies {
            None
        } else {
            game.reply(game_id)?
        };
        info!(%position, ?house_move, outcome = %game.outcome, "Move settled");
        Ok(MoveReceipt::confirmed(
            house_move.map(coords),
            Some(flags(game.outcome)),
        ))
    }

    #[instrument(skip(self))]
    async fn fetch_authoritative_state(
        &self,
        game_id: GameId,
    ) -> Result<AuthoritativeState, LedgerError> {
        let mut games = self.lock();
        let game = games
            .games
            .get_mut(&game_id)
            .ok_or_else(|| LedgerError::new(format!("Unknown game {}", game_id)))?;
        if self.deferred_replies {
            game.reply(game_id)?;
        }
        Ok(AuthoritativeState {
            player_identity: self.player_identity.clone(),
            winner_identity: Some(self.winner_identity(game.outcome)),
            total_moves_made: game.moves,
            is_player_turn: !game.outcome.is_terminal() && game.to_move == Actor::Player,
            raw_board: RawBoard::Packed(Felt::Text(format!("{:#x}", encode_packed(&game.board)))),
        })
    }

    #[instrument(skip(self))]
    async fn start_game(&self) -> Result<GameId, LedgerError> {
        let mut games = self.lock();
        let game_id = games.next_id;
        games.next_id += 1;
        games.games.insert(game_id, HouseGame::new());
        info!(game_id, "House opened a game");
        Ok(game_id)
    }
}
