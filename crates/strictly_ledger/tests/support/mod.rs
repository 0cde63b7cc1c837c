//! Scripted ledger shared by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;
use strictly_ledger::{
    AuthoritativeState, Coords, Felt, GameId, Ledger, LedgerError, MoveReceipt, OutcomeFlags,
    RawBoard,
};
use tokio::sync::Notify;

pub const OWNER: &str = "0xa11ce";
pub const HOUSE: &str = "0xc0ffee";

/// Ledger that replays queued answers in order.
#[derive(Default)]
pub struct ScriptedLedger {
    receipts: Mutex<VecDeque<Result<MoveReceipt, LedgerError>>>,
    states: Mutex<VecDeque<AuthoritativeState>>,
    games: Mutex<VecDeque<GameId>>,
    submitted: Mutex<Vec<(GameId, u8, u8)>>,
    gate: Option<Notify>,
}

impl ScriptedLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Submissions block until [`ScriptedLedger::release`] is called.
    pub fn gated() -> Self {
        Self {
            gate: Some(Notify::new()),
            ..Self::default()
        }
    }

    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.notify_one();
        }
    }

    pub fn push_receipt(&self, receipt: MoveReceipt) {
        self.receipts.lock().unwrap().push_back(Ok(receipt));
    }

    pub fn push_transport_error(&self, message: &str) {
        self.receipts
            .lock()
            .unwrap()
            .push_back(Err(LedgerError::new(message)));
    }

    pub fn push_state(&self, state: AuthoritativeState) {
        self.states.lock().unwrap().push_back(state);
    }

    pub fn push_game(&self, game_id: GameId) {
        self.games.lock().unwrap().push_back(game_id);
    }

    pub fn submitted(&self) -> Vec<(GameId, u8, u8)> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Ledger for ScriptedLedger {
    async fn submit_move(
        &self,
        game_id: GameId,
        column: u8,
        row: u8,
    ) -> Result<MoveReceipt, LedgerError> {
        self.submitted.lock().unwrap().push((game_id, column, row));
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.receipts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LedgerError::new("no scripted receipt")))
    }

    async fn fetch_authoritative_state(
        &self,
        _game_id: GameId,
    ) -> Result<AuthoritativeState, LedgerError> {
        self.states
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| LedgerError::new("no scripted state"))
    }

    async fn start_game(&self) -> Result<GameId, LedgerError> {
        self.games
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| LedgerError::new("no scripted game"))
    }
}

/// Packs cells given as `0=Empty, 1=Player, 2=House`.
pub fn packed(cells: [u64; 9]) -> u64 {
    cells
        .iter()
        .enumerate()
        .fold(0, |acc, (i, v)| acc | (v << (i * 2)))
}

pub fn state(cells: [u64; 9], is_player_turn: bool, winner: Option<&str>) -> AuthoritativeState {
    let moves = cells.iter().filter(|c| **c != 0).count() as u8;
    AuthoritativeState {
        player_identity: OWNER.to_string(),
        winner_identity: winner.map(str::to_string),
        total_moves_made: moves,
        is_player_turn,
        raw_board: RawBoard::Packed(Felt::Number(packed(cells))),
    }
}

pub fn confirmed(house: Option<(u64, u64)>, outcome: Option<OutcomeFlags>) -> MoveReceipt {
    MoveReceipt::confirmed(house.map(|(column, row)| Coords { column, row }), outcome)
}
