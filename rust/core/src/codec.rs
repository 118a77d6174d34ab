//! Text encoding of the shared game state.
//!
//! The format is one header line followed by [`ROWS`] lines of [`COLS`]
//! single-space separated cell tokens. A token is `0` for an empty cell or
//! `<count><R|B>` for an occupied one.

use crate::board::{Board, Cell, Color, Coord, COLS, ROWS};
use crate::errors::DecodeError;
use crate::state::GameState;
use std::fmt;

const INITIALIZING: &str = "Initializing:";
const HUMAN_MOVE: &str = "Human Move:";
const ENGINE_MOVE: &str = "AI Move:";
const GAME_OVER: &str = "Game Over! Winner:";

/// First line of the shared resource: who moved last, or who won.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Header {
    /// Fresh board written by a reset
    Initializing,
    /// Human submitted a move that the engine has yet to apply
    HumanMoved { at: Option<Coord> },
    /// Engine finished its turn
    EngineMoved,
    /// Game ended
    GameOver { winner: Color },
}

impl Header {
    pub fn parse(line: &str) -> Result<Header, DecodeError> {
        let line = line.trim_end_matches('\r');
        if line.starts_with(INITIALIZING) {
            return Ok(Header::Initializing);
        }
        if let Some(rest) = line.strip_prefix(HUMAN_MOVE) {
            return Ok(Header::HumanMoved {
                at: parse_coord(rest),
            });
        }
        if line.starts_with(ENGINE_MOVE) {
            return Ok(Header::EngineMoved);
        }
        if let Some(rest) = line.strip_prefix(GAME_OVER) {
            let mut letters = rest.trim().chars();
            return match (letters.next().and_then(Color::from_letter), letters.next()) {
                (Some(winner), None) => Ok(Header::GameOver { winner }),
                _ => Err(DecodeError::MalformedHeader(line.to_string())),
            };
        }
        Err(DecodeError::MalformedHeader(line.to_string()))
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Header::Initializing => f.write_str(INITIALIZING),
            Header::HumanMoved { at: Some(at) } => {
                write!(f, "{} {} {}", HUMAN_MOVE, at.row(), at.col())
            }
            Header::HumanMoved { at: None } => f.write_str(HUMAN_MOVE),
            Header::EngineMoved => f.write_str(ENGINE_MOVE),
            Header::GameOver { winner } => write!(f, "{} {}", GAME_OVER, winner),
        }
    }
}

fn parse_coord(rest: &str) -> Option<Coord> {
    let mut parts = rest.split_whitespace();
    let row = parts.next()?.parse().ok()?;
    let col = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Coord::new(row, col)
}

/// Decodes the full resource text into a [`GameState`].
///
/// Surrounding whitespace is ignored (the engine may or may not write a
/// trailing newline). Inside the grid the format is strict: exactly one
/// space between tokens.
///
/// # Examples
///
/// ```
/// use chain_reaction_core::board::Color;
/// use chain_reaction_core::codec::decode;
///
/// let text = "AI Move:\n".to_string() + &"0 0 0 0 0 0\n".repeat(8) + "1R 0 0 0 0 2B\n";
/// let state = decode(&text).expect("valid state");
/// assert_eq!(state.mover(), Some(Color::Red));
/// assert_eq!(state.board().orb_counts().blue, 2);
/// ```
pub fn decode(text: &str) -> Result<GameState, DecodeError> {
    let mut lines = text.trim().lines();
    let header = Header::parse(lines.next().unwrap_or_default())?;

    let rows: Vec<&str> = lines.collect();
    if rows.len() != ROWS {
        return Err(DecodeError::MalformedGrid {
            expected_rows: ROWS,
            expected_cols: COLS,
            detail: format!("found {} rows", rows.len()),
        });
    }

    let mut cells = [[Cell::EMPTY; COLS]; ROWS];
    for (row, line) in rows.iter().enumerate() {
        let tokens: Vec<&str> = line.trim_end_matches('\r').split(' ').collect();
        if tokens.len() != COLS {
            return Err(DecodeError::MalformedGrid {
                expected_rows: ROWS,
                expected_cols: COLS,
                detail: format!("row {} has {} cells", row, tokens.len()),
            });
        }
        for (col, token) in tokens.iter().enumerate() {
            cells[row][col] = decode_cell(token).ok_or_else(|| DecodeError::MalformedCell {
                row,
                col,
                token: token.to_string(),
            })?;
        }
    }

    Ok(GameState::from_parts(header, Board::from_rows(cells)))
}

fn decode_cell(token: &str) -> Option<Cell> {
    if token == "0" {
        return Some(Cell::EMPTY);
    }
    let owner = Color::from_letter(token.chars().last()?)?;
    let digits = &token[..token.len() - 1];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Cell::occupied(digits.parse().ok()?, owner)
}

fn encode_cell(cell: &Cell) -> String {
    match cell.owner() {
        Some(owner) => format!("{}{}", cell.count(), owner),
        None => "0".to_string(),
    }
}

/// Encodes a board under the given header. Every line, including the last
/// grid row, ends with a newline.
pub fn encode(board: &Board, header: &Header) -> String {
    let mut out = header.to_string();
    out.push('\n');
    for row in board.rows() {
        let tokens: Vec<String> = row.iter().map(encode_cell).collect();
        out.push_str(&tokens.join(" "));
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_tokens() {
        assert_eq!(decode_cell("0"), Some(Cell::EMPTY));
        assert_eq!(decode_cell("3R"), Cell::occupied(3, Color::Red));
        assert_eq!(decode_cell("12B"), Cell::occupied(12, Color::Blue));
        assert_eq!(decode_cell("0R"), None);
        assert_eq!(decode_cell("R"), None);
        assert_eq!(decode_cell("2X"), None);
        assert_eq!(decode_cell("+2R"), None);
        assert_eq!(decode_cell(""), None);
        assert_eq!(decode_cell("1é"), None);
    }

    #[test]
    fn header_prefixes() {
        assert_eq!(Header::parse("Initializing:"), Ok(Header::Initializing));
        assert_eq!(Header::parse("AI Move:"), Ok(Header::EngineMoved));
        assert_eq!(
            Header::parse("Human Move:"),
            Ok(Header::HumanMoved { at: None })
        );
        assert_eq!(
            Header::parse("Human Move: 3 4"),
            Ok(Header::HumanMoved {
                at: Coord::new(3, 4)
            })
        );
        assert_eq!(
            Header::parse("Game Over! Winner: B"),
            Ok(Header::GameOver {
                winner: Color::Blue
            })
        );
        assert!(Header::parse("Game Over! Winner: N").is_err());
        assert!(Header::parse("42").is_err());
        assert!(Header::parse("").is_err());
    }

    #[test]
    fn header_display_matches_parse() {
        let headers = [
            Header::Initializing,
            Header::HumanMoved { at: None },
            Header::HumanMoved {
                at: Coord::new(8, 5),
            },
            Header::EngineMoved,
            Header::GameOver { winner: Color::Red },
        ];
        for header in headers {
            assert_eq!(Header::parse(&header.to_string()), Ok(header));
        }
    }

    #[test]
    fn encode_empty_board_layout() {
        let text = encode(&Board::empty(), &Header::Initializing);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), ROWS + 1);
        assert_eq!(lines[0], "Initializing:");
        assert!(lines[1..].iter().all(|l| *l == "0 0 0 0 0 0"));
        assert!(text.ends_with('\n'));
    }
}
