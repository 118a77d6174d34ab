use crate::board::{Color, Coord};
use thiserror::Error;

/// Reasons the shared state text failed to decode.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("malformed header: {0:?}")]
    MalformedHeader(String),
    #[error("malformed grid: expected {expected_rows} rows of {expected_cols} cells, {detail}")]
    MalformedGrid {
        expected_rows: usize,
        expected_cols: usize,
        detail: String,
    },
    #[error("malformed cell {token:?} at row {row}, column {col}")]
    MalformedCell {
        row: usize,
        col: usize,
        token: String,
    },
}

/// Why a requested human move was refused.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IllegalMove {
    #[error("Invalid move coordinates: ({row}, {col})")]
    OutOfBounds { row: i64, col: i64 },
    #[error("Game is already over (winner: {winner})")]
    GameOver { winner: Color },
    #[error("Not your turn")]
    NotYourTurn,
    #[error("Invalid move: cell {at} is occupied by opponent")]
    OccupiedByOpponent { at: Coord },
}
