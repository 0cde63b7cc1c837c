//! Board codec: one decoder per ledger wire shape.
//!
//! The ledger exposes the same board three ways. Each shape is an explicit
//! variant of [`RawBoard`]; there is no type sniffing. Decoding builds a fresh
//! board and either returns it whole or fails, so a caller holding a previous
//! board keeps it untouched on error.

use crate::action::{Move, MoveError};
use crate::contracts;
use crate::error::ConsistencyWarning;
use crate::position::Position;
use crate::types::{Actor, Board, Cell, GameId};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Bits used by the packed field: 9 cells, 2 bits each.
const PACKED_BITS: u32 = 18;

/// Error produced while decoding a raw board.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum CodecError {
    /// The raw data violates its encoding.
    #[display("Malformed encoding: {}", _0)]
    MalformedEncoding(String),
    /// A move log is inconsistent with itself.
    #[display("Inconsistent history: {}", _0)]
    InconsistentHistory(String),
}

impl std::error::Error for CodecError {}

/// A ledger field element: a JSON number or a (usually `0x`-prefixed) string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum Felt {
    /// Plain JSON number.
    Number(u64),
    /// Hex (`0x..`) or decimal text.
    Text(String),
}

impl Felt {
    /// Parses the felt as an unsigned integer.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::MalformedEncoding`] for unparsable or oversized text.
    pub fn to_u64(&self) -> Result<u64, CodecError> {
        match self {
            Felt::Number(n) => Ok(*n),
            Felt::Text(s) => parse_felt(s),
        }
    }

    /// True if the felt is numerically zero.
    pub fn is_zero(&self) -> bool {
        matches!(self.to_u64(), Ok(0))
    }
}

impl From<u64> for Felt {
    fn from(n: u64) -> Self {
        Felt::Number(n)
    }
}

impl From<&str> for Felt {
    fn from(s: &str) -> Self {
        Felt::Text(s.to_string())
    }
}

/// Parses hex (`0x`-prefixed) or decimal text into an integer.
pub fn parse_felt(s: &str) -> Result<u64, CodecError> {
    let trimmed = s.trim();
    let parsed = match trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => trimmed.parse::<u64>(),
    };
    parsed.map_err(|e| CodecError::MalformedEncoding(format!("field element {:?}: {}", s, e)))
}

/// One entry of the structured move array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct StructuredCell {
    /// Column (x), possibly hex text.
    #[serde(alias = "x")]
    pub column: Felt,
    /// Row (y), possibly hex text.
    #[serde(alias = "y")]
    pub row: Felt,
    /// True if the player owns the cell, false for the house.
    #[serde(alias = "isPlayer")]
    pub is_player: bool,
}

/// One entry of the move-history log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct HistoryEntry {
    /// Game the entry belongs to.
    #[serde(alias = "gameId")]
    pub game_id: GameId,
    /// Column (x).
    #[serde(alias = "x")]
    pub column: u64,
    /// Row (y).
    #[serde(alias = "y")]
    pub row: u64,
    /// Who moved.
    pub actor: Actor,
}

impl From<&Move> for HistoryEntry {
    fn from(mov: &Move) -> Self {
        Self {
            game_id: mov.game_id,
            column: mov.position.column() as u64,
            row: mov.position.row() as u64,
            actor: mov.actor,
        }
    }
}

/// Raw board representation, tagged by wire shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "shape", content = "data", rename_all = "lowercase")]
pub enum RawBoard {
    /// Radix-4 bit field, 2 bits per cell, least-significant pair first.
    Packed(Felt),
    /// Unordered list of claimed cells.
    Structured(Vec<StructuredCell>),
    /// Ordered move log, possibly spanning several games.
    History(Vec<HistoryEntry>),
}

/// A decoded board plus any ambiguity found while decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    /// The canonical board.
    pub board: Board,
    /// Non-fatal findings; the board is still the best available reading.
    pub warnings: Vec<ConsistencyWarning>,
}

/// Decodes `raw` into a canonical board for `game_id`.
///
/// # Errors
///
/// - [`CodecError::MalformedEncoding`] for reserved cell values, stray bits,
///   unparsable felts or out-of-range coordinates
/// - [`CodecError::InconsistentHistory`] when entries collide on a cell
#[instrument(skip(raw), fields(shape = raw.shape_name()))]
pub fn decode(raw: &RawBoard, game_id: GameId) -> Result<Decoded, CodecError> {
    let decoded = match raw {
        RawBoard::Packed(field) => decode_packed(field),
        RawBoard::Structured(cells) => decode_structured(cells),
        RawBoard::History(entries) => decode_history(entries, game_id),
    }?;
    debug!(
        occupied = decoded.board.occupied(),
        warnings = decoded.warnings.len(),
        "Board decoded"
    );
    Ok(decoded)
}

impl RawBoard {
    /// Parses a shape-tagged JSON document.
    ///
    /// # Errors
    ///
    /// [`CodecError::MalformedEncoding`] when the document is not a known shape.
    pub fn from_json(text: &str) -> Result<Self, CodecError> {
        serde_json::from_str(text).map_err(|e| CodecError::MalformedEncoding(e.to_string()))
    }

    /// Name of the wire shape, for logs.
    pub fn shape_name(&self) -> &'static str {
        match self {
            RawBoard::Packed(_) => "packed",
            RawBoard::Structured(_) => "structured",
            RawBoard::History(_) => "history",
        }
    }
}

/// Encodes a board into the packed radix-4 field.
pub fn encode_packed(board: &Board) -> u32 {
    board
        .cells()
        .iter()
        .enumerate()
        .fold(0u32, |acc, (i, cell)| {
            let bits = match cell {
                Cell::Empty => 0,
                Cell::Occupied(Actor::Player) => 1,
                Cell::Occupied(Actor::House) => 2,
            };
            acc | (bits << (i * 2))
        })
}

fn decode_packed(field: &Felt) -> Result<Decoded, CodecError> {
    let value = field.to_u64()?;
    if value >> PACKED_BITS != 0 {
        return Err(CodecError::MalformedEncoding(format!(
            "packed field {:#x} has bits set beyond cell 8",
            value
        )));
    }

    let mut board = Board::new();
    for pos in Position::ALL {
        let cell = match (value >> (pos.to_index() * 2)) & 0b11 {
            0 => Cell::Empty,
            1 => Cell::Occupied(Actor::Player),
            2 => Cell::Occupied(Actor::House),
            _ => {
                return Err(CodecError::MalformedEncoding(format!(
                    "cell {} holds reserved value 3",
                    pos.to_index()
                )));
            }
        };
        board = board.with(pos, cell);
    }

    let mut warnings = Vec::new();
    check_counts(&board, &mut warnings);
    Ok(Decoded { board, warnings })
}

fn decode_structured(cells: &[StructuredCell]) -> Result<Decoded, CodecError> {
    let mut board = Board::new();
    let mut warnings = Vec::new();

    for (i, entry) in cells.iter().enumerate() {
        let column = entry.column.to_u64()?;
        let row = entry.row.to_u64()?;
        let pos = Position::from_coords(column, row).ok_or_else(|| {
            CodecError::MalformedEncoding(format!(
                "entry {}: coordinates ({}, {}) outside the board",
                i, column, row
            ))
        })?;
        let actor = if entry.is_player {
            Actor::Player
        } else {
            Actor::House
        };

        match board.get(pos) {
            Cell::Empty => board = board.with(pos, Cell::Occupied(actor)),
            Cell::Occupied(existing) if existing == actor => {
                warnings.push(ConsistencyWarning::new(format!(
                    "entry {}: {} listed twice for {:?}",
                    i, pos, actor
                )));
            }
            Cell::Occupied(existing) => {
                return Err(CodecError::InconsistentHistory(format!(
                    "entry {}: {} claimed by both {:?} and {:?}",
                    i, pos, existing, actor
                )));
            }
        }
    }

    check_counts(&board, &mut warnings);
    Ok(Decoded { board, warnings })
}

fn decode_history(entries: &[HistoryEntry], game_id: GameId) -> Result<Decoded, CodecError> {
    let mut board = Board::new();
    let mut warnings = Vec::new();
    let mut previous: Option<Actor> = None;
    let mut applied = 0usize;

    for (i, entry) in entries.iter().enumerate() {
        if entry.game_id != game_id {
            continue;
        }
        let mov = Move::from_coords(game_id, entry.column, entry.row, entry.actor)
            .map_err(|e| CodecError::MalformedEncoding(format!("log entry {}: {}", i, e)))?;

        let expected = previous.map(Actor::opponent).unwrap_or(Actor::Player);
        if mov.actor != expected {
            warnings.push(ConsistencyWarning::new(format!(
                "log entry {}: {:?} moved when {:?} was expected",
                i, mov.actor, expected
            )));
        }

        // The log names its own actor; alternation breaks are warnings above.
        board = contracts::apply(&board, &mov, mov.actor).map_err(|e| match e {
            MoveError::CellOccupied(pos) => CodecError::InconsistentHistory(format!(
                "log entry {} targets already-filled cell {}",
                i, pos
            )),
            other => CodecError::MalformedEncoding(format!("log entry {}: {}", i, other)),
        })?;
        previous = Some(mov.actor);
        applied += 1;
    }

    debug!(
        applied,
        skipped = entries.len() - applied,
        "Replayed history log"
    );
    Ok(Decoded { board, warnings })
}

fn check_counts(board: &Board, warnings: &mut Vec<ConsistencyWarning>) {
    if !board.has_alternating_counts() {
        warnings.push(ConsistencyWarning::new(format!(
            "{} player cells vs {} house cells cannot come from alternating turns",
            board.count(Actor::Player),
            board.count(Actor::House)
        )));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn packed(value: u64) -> RawBoard {
        RawBoard::Packed(Felt::Number(value))
    }

    #[test]
    fn test_packed_least_significant_first() {
        // cell 0 = player (01), cell 4 = house (10 << 8)
        let decoded = decode(&packed(0b01 | (0b10 << 8)), 1).expect("valid field");
        assert_eq!(
            decoded.board.get(Position::TopLeft),
            Cell::Occupied(Actor::Player)
        );
        assert_eq!(decoded.board.get(Position::Center), Cell::Occupied(Actor::House));
        assert_eq!(decoded.board.occupied(), 2);
        assert!(decoded.warnings.is_empty());
    }

    #[test]
    fn test_packed_hex_text() {
        let raw = RawBoard::Packed(Felt::from("0x101"));
        let decoded = decode(&raw, 1).expect("valid hex");
        // 0x101 = cell 0 player, cell 4 player
        assert_eq!(decoded.board.count(Actor::Player), 2);
        assert_eq!(decoded.warnings.len(), 1);
    }

    #[test]
    fn test_packed_reserved_value_rejected() {
        let result = decode(&packed(0b11 << 6), 1);
        assert!(matches!(result, Err(CodecError::MalformedEncoding(_))));
    }

    #[test]
    fn test_packed_stray_high_bits_rejected() {
        let result = decode(&packed(1 << 18), 1);
        assert!(matches!(result, Err(CodecError::MalformedEncoding(_))));
    }

    #[test]
    fn test_packed_garbage_text_rejected() {
        let raw = RawBoard::Packed(Felt::from("0xzz"));
        assert!(matches!(
            decode(&raw, 1),
            Err(CodecError::MalformedEncoding(_))
        ));
    }

    #[test]
    fn test_structured_hex_coordinates() {
        let raw: RawBoard = serde_json::from_value(json!({
            "shape": "structured",
            "data": [
                { "x": "0x1", "y": "0x1", "is_player": true },
                { "column": 2, "row": "0x0", "is_player": false }
            ]
        }))
        .expect("valid json");
        let decoded = decode(&raw, 7).expect("valid cells");
        assert_eq!(decoded.board.get(Position::Center), Cell::Occupied(Actor::Player));
        assert_eq!(decoded.board.get(Position::TopRight), Cell::Occupied(Actor::House));
    }

    #[test]
    fn test_structured_out_of_range() {
        let raw = RawBoard::Structured(vec![StructuredCell {
            column: Felt::from("0x3"),
            row: Felt::Number(0),
            is_player: true,
        }]);
        assert!(matches!(
            decode(&raw, 1),
            Err(CodecError::MalformedEncoding(_))
        ));
    }

    #[test]
    fn test_structured_conflicting_claims() {
        let cell = |is_player| StructuredCell {
            column: Felt::Number(0),
            row: Felt::Number(0),
            is_player,
        };
        let raw = RawBoard::Structured(vec![cell(true), cell(false)]);
        assert!(matches!(
            decode(&raw, 1),
            Err(CodecError::InconsistentHistory(_))
        ));
    }

    #[test]
    fn test_structured_duplicate_warns() {
        let cell = StructuredCell {
            column: Felt::Number(0),
            row: Felt::Number(0),
            is_player: true,
        };
        let raw = RawBoard::Structured(vec![cell.clone(), cell]);
        let decoded = decode(&raw, 1).expect("duplicate is tolerated");
        assert_eq!(decoded.board.occupied(), 1);
        assert_eq!(decoded.warnings.len(), 1);
    }

    fn entry(game_id: GameId, column: u64, row: u64, actor: Actor) -> HistoryEntry {
        HistoryEntry {
            game_id,
            column,
            row,
            actor,
        }
    }

    #[test]
    fn test_history_filters_by_game() {
        let raw = RawBoard::History(vec![
            entry(1, 1, 1, Actor::Player),
            entry(2, 0, 0, Actor::Player),
            entry(1, 0, 0, Actor::House),
        ]);
        let decoded = decode(&raw, 1).expect("valid log");
        assert_eq!(decoded.board.occupied(), 2);
        assert_eq!(decoded.board.get(Position::TopLeft), Cell::Occupied(Actor::House));
        assert!(decoded.warnings.is_empty());
    }

    #[test]
    fn test_history_collision_is_inconsistent() {
        let raw = RawBoard::History(vec![
            entry(1, 1, 1, Actor::Player),
            entry(1, 1, 1, Actor::House),
        ]);
        assert!(matches!(
            decode(&raw, 1),
            Err(CodecError::InconsistentHistory(_))
        ));
    }

    #[test]
    fn test_history_out_of_order_warns() {
        let raw = RawBoard::History(vec![
            entry(1, 1, 1, Actor::Player),
            entry(1, 0, 0, Actor::Player),
        ]);
        let decoded = decode(&raw, 1).expect("collision-free log");
        assert_eq!(decoded.warnings.len(), 1);
    }

    #[test]
    fn test_encode_matches_decode_layout() {
        let decoded = decode(&packed(0b10_01), 1).expect("valid field");
        assert_eq!(encode_packed(&decoded.board), 0b10_01);
    }

    #[test]
    fn test_from_json_rejects_unknown_shape() {
        let err = RawBoard::from_json(r#"{"shape":"hexagonal","data":1}"#).expect_err("unknown");
        assert!(matches!(err, CodecError::MalformedEncoding(_)));
        let raw = RawBoard::from_json(r#"{"shape":"packed","data":16}"#).expect("packed");
        assert_eq!(raw.shape_name(), "packed");
    }

    #[test]
    fn test_shape_tag_json() {
        let raw: RawBoard =
            serde_json::from_value(json!({ "shape": "packed", "data": "0x6" })).expect("json");
        assert_eq!(raw, RawBoard::Packed(Felt::from("0x6")));
    }
}
