//! Transaction receipt normalization.
//!
//! Receipts are matched by event name: an event belongs to the game contract
//! when its `from_address` is the contract and one of its keys contains the
//! event name. Events keyed only by bare selector hashes are a legacy scheme
//! and are ignored with a warning.
//!
//! Data layouts (all felts):
//!
//! | event           | data                                           |
//! |-----------------|------------------------------------------------|
//! | `GameStarted`   | `[game_id, player, bet_low, bet_high]`         |
//! | `PlayerMoved`   | `[game_id, player, x, y]`                      |
//! | `ComputerMoved` | `[game_id, x, y]`                              |
//! | `GameFinished`  | `[game_id, winner, bet_low, bet_high, outcome]`|
//!
//! `outcome` is `0=InProgress, 1=PlayerWon, 2=ComputerWon, 3=Tie`.

use crate::codec::{CodecError, Felt};
use crate::error::ConsistencyWarning;
use crate::ledger::{Coords, MoveReceipt, OutcomeFlags, is_zero_identity, same_identity};
use crate::types::GameId;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};

const GAME_STARTED: &str = "GameStarted";
const PLAYER_MOVED: &str = "PlayerMoved";
const COMPUTER_MOVED: &str = "ComputerMoved";
const GAME_FINISHED: &str = "GameFinished";

/// Execution status of a settled transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    /// Transaction executed.
    Succeeded,
    /// Transaction reverted.
    Reverted,
}

/// One emitted event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct EventRecord {
    /// Emitting contract.
    #[serde(alias = "fromAddress")]
    pub from_address: String,
    /// Event keys (name or selector).
    #[serde(default)]
    pub keys: Vec<String>,
    /// Event payload.
    #[serde(default)]
    pub data: Vec<Felt>,
}

/// A settled transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TransactionReceipt {
    /// Transaction hash.
    #[serde(alias = "transactionHash")]
    pub transaction_hash: String,
    /// Whether it executed or reverted.
    #[serde(alias = "executionStatus")]
    pub execution_status: ExecutionStatus,
    /// Events emitted.
    #[serde(default)]
    pub events: Vec<EventRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EventKind {
    GameStarted,
    PlayerMoved,
    ComputerMoved,
    GameFinished,
}

fn classify(event: &EventRecord) -> Option<EventKind> {
    let has = |name: &str| event.keys.iter().any(|k| k.contains(name));
    if has(COMPUTER_MOVED) {
        Some(EventKind::ComputerMoved)
    } else if has(GAME_FINISHED) {
        Some(EventKind::GameFinished)
    } else if has(PLAYER_MOVED) {
        Some(EventKind::PlayerMoved)
    } else if has(GAME_STARTED) {
        Some(EventKind::GameStarted)
    } else {
        None
    }
}

fn field(event: &EventRecord, idx: usize, name: &str) -> Result<u64, CodecError> {
    event
        .data
        .get(idx)
        .ok_or_else(|| {
            CodecError::MalformedEncoding(format!(
                "event {:?} is missing `{}` at data[{}]",
                event.keys, name, idx
            ))
        })?
        .to_u64()
}

fn felt_text(felt: &Felt) -> String {
    match felt {
        Felt::Number(n) => format!("{:#x}", n),
        Felt::Text(s) => s.clone(),
    }
}

/// Reduces a move transaction receipt to a [`MoveReceipt`] for `game_id`.
///
/// A reverted transaction is a rejection. A succeeded transaction is always
/// confirmed: when a recognized event has a truncated payload, unparsable
/// felts or an unknown outcome index, the receipt is marked with
/// [`MoveReceipt::unreadable_reply`] instead of being dropped, because the
/// ledger has already applied the player's move.
#[instrument(skip(receipt), fields(tx = %receipt.transaction_hash, events = receipt.events.len()))]
pub fn normalize_move_receipt(
    receipt: &TransactionReceipt,
    contract_address: &str,
    player_identity: &str,
    game_id: GameId,
) -> MoveReceipt {
    if receipt.execution_status == ExecutionStatus::Reverted {
        debug!("Transaction reverted");
        return MoveReceipt::rejected();
    }

    let mut warnings = Vec::new();
    match read_events(receipt, contract_address, player_identity, game_id, &mut warnings) {
        Ok((house_move, outcome)) => {
            debug!(?house_move, ?outcome, "Receipt normalized");
            MoveReceipt {
                warnings,
                ..MoveReceipt::confirmed(house_move, outcome)
            }
        }
        Err(e) => {
            error!(error = %e, "Transaction succeeded but its events are unreadable");
            MoveReceipt {
                warnings,
                ..MoveReceipt::unreadable(e.to_string())
            }
        }
    }
}

fn read_events(
    receipt: &TransactionReceipt,
    contract_address: &str,
    player_identity: &str,
    game_id: GameId,
    warnings: &mut Vec<ConsistencyWarning>,
) -> Result<(Option<Coords>, Option<OutcomeFlags>), CodecError> {
    let mut house_move: Option<Coords> = None;
    let mut outcome: Option<OutcomeFlags> = None;

    for event in receipt
        .events
        .iter()
        .filter(|e| same_identity(&e.from_address, contract_address))
    {
        let Some(kind) = classify(event) else {
            warnings.push(ConsistencyWarning::new(format!(
                "ignoring contract event with unrecognized keys {:?}",
                event.keys
            )));
            continue;
        };

        match kind {
            EventKind::ComputerMoved => {
                if field(event, 0, "game_id")? != game_id as u64 {
                    debug!("ComputerMoved for another game");
                    continue;
                }
                let coords = Coords {
                    column: field(event, 1, "x")?,
                    row: field(event, 2, "y")?,
                };
                if house_move.is_some() {
                    warnings.push(ConsistencyWarning::new(
                        "multiple ComputerMoved events; keeping the first",
                    ));
                } else {
                    house_move = Some(coords);
                }
            }
            EventKind::GameFinished => {
                if field(event, 0, "game_id")? != game_id as u64 {
                    debug!("GameFinished for another game");
                    continue;
                }
                outcome = finished_outcome(event, player_identity, warnings)?;
            }
            EventKind::PlayerMoved | EventKind::GameStarted => {}
        }
    }
    Ok((house_move, outcome))
}

fn single(flag: fn(&mut OutcomeFlags)) -> OutcomeFlags {
    let mut flags = OutcomeFlags::default();
    flag(&mut flags);
    flags
}

/// Reads the terminal flags of a `GameFinished` event.
///
/// The outcome index wins over the winner felt. An index of `InProgress`
/// contradicts the event itself, so no flags are carried and the local
/// evaluation decides.
fn finished_outcome(
    event: &EventRecord,
    player_identity: &str,
    warnings: &mut Vec<ConsistencyWarning>,
) -> Result<Option<OutcomeFlags>, CodecError> {
    let winner = event.data.get(1).map(felt_text).ok_or_else(|| {
        CodecError::MalformedEncoding("GameFinished is missing `winner` at data[1]".to_string())
    })?;

    let by_winner = if is_zero_identity(&winner) {
        single(|f| f.is_tie = true)
    } else if same_identity(&winner, player_identity) {
        single(|f| f.winner_is_player = true)
    } else {
        single(|f| f.winner_is_house = true)
    };

    if event.data.len() < 5 {
        return Ok(Some(by_winner));
    }

    let by_index = match field(event, 4, "outcome")? {
        0 => {
            warnings.push(ConsistencyWarning::new(format!(
                "GameFinished with winner {} reports the game in progress; deferring to local evaluation",
                winner
            )));
            return Ok(None);
        }
        1 => single(|f| f.winner_is_player = true),
        2 => single(|f| f.winner_is_house = true),
        3 => single(|f| f.is_tie = true),
        other => {
            return Err(CodecError::MalformedEncoding(format!(
                "GameFinished outcome index {} is not a known outcome",
                other
            )));
        }
    };

    if by_index != by_winner {
        warnings.push(ConsistencyWarning::new(format!(
            "GameFinished winner {} disagrees with outcome index; using the index",
            winner
        )));
    }
    Ok(Some(by_index))
}

/// Extracts the new game id from a `start_game` receipt.
///
/// # Errors
///
/// Returns [`CodecError::MalformedEncoding`] if the transaction reverted or
/// carries no `GameStarted` event from the contract.
#[instrument(skip(receipt), fields(tx = %receipt.transaction_hash))]
pub fn started_game_id(
    receipt: &TransactionReceipt,
    contract_address: &str,
) -> Result<GameId, CodecError> {
    if receipt.execution_status == ExecutionStatus::Reverted {
        return Err(CodecError::MalformedEncoding(
            "start_game transaction reverted".to_string(),
        ));
    }
    let event = receipt
        .events
        .iter()
        .filter(|e| same_identity(&e.from_address, contract_address))
        .find(|e| classify(e) == Some(EventKind::GameStarted))
        .ok_or_else(|| {
            CodecError::MalformedEncoding("no GameStarted event in receipt".to_string())
        })?;
    let id = field(event, 0, "game_id")?;
    GameId::try_from(id)
        .map_err(|_| CodecError::MalformedEncoding(format!("game id {} exceeds u32", id)))
}
