use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of rows on the game board.
pub const ROWS: usize = 9;
/// Number of columns on the game board.
pub const COLS: usize = 6;

/// Orb color owning a cell. Red is the human side, Blue the engine side.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Color {
    /// Human player (`R` in the shared text format)
    #[serde(rename = "R")]
    Red,
    /// Engine player (`B` in the shared text format)
    #[serde(rename = "B")]
    Blue,
}

impl Color {
    /// The color the human client plays.
    pub const HUMAN: Color = Color::Red;
    /// The color the external engine plays.
    pub const ENGINE: Color = Color::Blue;

    pub fn letter(self) -> char {
        match self {
            Color::Red => 'R',
            Color::Blue => 'B',
        }
    }

    pub fn from_letter(letter: char) -> Option<Color> {
        match letter {
            'R' => Some(Color::Red),
            'B' => Some(Color::Blue),
            _ => None,
        }
    }

    pub fn opponent(self) -> Color {
        match self {
            Color::Red => Color::Blue,
            Color::Blue => Color::Red,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// A single board square holding zero or more orbs of one color.
///
/// The constructor enforces `count == 0 <=> owner == None`; a cell can only
/// be built empty or with a positive count and an owner.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct Cell {
    count: u32,
    owner: Option<Color>,
}

impl Cell {
    pub const EMPTY: Cell = Cell {
        count: 0,
        owner: None,
    };

    /// Returns `None` when `count` is zero; use [`Cell::EMPTY`] for that.
    pub fn occupied(count: u32, owner: Color) -> Option<Cell> {
        if count == 0 {
            return None;
        }
        Some(Cell {
            count,
            owner: Some(owner),
        })
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn owner(&self) -> Option<Color> {
        self.owner
    }

    pub fn is_empty(&self) -> bool {
        self.owner.is_none()
    }
}

/// Zero-based board coordinate, always within `ROWS` x `COLS`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Coord {
    row: usize,
    col: usize,
}

impl Coord {
    /// Bounds-checked constructor. Accepts signed input so negative request
    /// values are rejected here rather than at deserialization.
    pub fn new(row: i64, col: i64) -> Option<Coord> {
        if row < 0 || col < 0 || row >= ROWS as i64 || col >= COLS as i64 {
            return None;
        }
        Some(Coord {
            row: row as usize,
            col: col as usize,
        })
    }

    pub fn row(&self) -> usize {
        self.row
    }

    pub fn col(&self) -> usize {
        self.col
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// Orb totals per color across a board.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub struct OrbCounts {
    pub red: u32,
    pub blue: u32,
}

impl OrbCounts {
    pub fn total(&self) -> u32 {
        self.red + self.blue
    }

    pub fn of(&self, color: Color) -> u32 {
        match color {
            Color::Red => self.red,
            Color::Blue => self.blue,
        }
    }
}

/// Fixed-size 9x6 grid of cells.
///
/// Backed by an array so the dimensions are part of the type and can never
/// change after construction.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Default)]
pub struct Board {
    cells: [[Cell; COLS]; ROWS],
}

impl Board {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_rows(cells: [[Cell; COLS]; ROWS]) -> Self {
        Self { cells }
    }

    pub fn cell(&self, at: Coord) -> Cell {
        self.cells[at.row][at.col]
    }

    pub fn set(&mut self, at: Coord, cell: Cell) {
        self.cells[at.row][at.col] = cell;
    }

    pub fn rows(&self) -> impl Iterator<Item = &[Cell; COLS]> {
        self.cells.iter()
    }

    pub fn orb_counts(&self) -> OrbCounts {
        let mut counts = OrbCounts::default();
        for cell in self.cells.iter().flatten() {
            match cell.owner {
                Some(Color::Red) => counts.red += cell.count,
                Some(Color::Blue) => counts.blue += cell.count,
                None => {}
            }
        }
        counts
    }

    pub fn is_empty(&self) -> bool {
        self.cells.iter().flatten().all(Cell::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn occupied_rejects_zero_count() {
        assert!(Cell::occupied(0, Color::Red).is_none());
        let cell = Cell::occupied(2, Color::Blue).expect("cell");
        assert_eq!(cell.count(), 2);
        assert_eq!(cell.owner(), Some(Color::Blue));
    }

    #[test]
    fn coord_bounds() {
        assert!(Coord::new(0, 0).is_some());
        assert!(Coord::new(8, 5).is_some());
        assert!(Coord::new(9, 0).is_none());
        assert!(Coord::new(0, 6).is_none());
        assert!(Coord::new(-1, 3).is_none());
    }

    #[test]
    fn orb_counts_sum_per_color() {
        let mut board = Board::empty();
        board.set(
            Coord::new(0, 0).unwrap(),
            Cell::occupied(3, Color::Red).unwrap(),
        );
        board.set(
            Coord::new(4, 2).unwrap(),
            Cell::occupied(1, Color::Red).unwrap(),
        );
        board.set(
            Coord::new(8, 5).unwrap(),
            Cell::occupied(2, Color::Blue).unwrap(),
        );

        let counts = board.orb_counts();
        assert_eq!(counts.red, 4);
        assert_eq!(counts.blue, 2);
        assert_eq!(counts.total(), 6);
        assert!(!board.is_empty());
        assert!(Board::empty().is_empty());
    }

    #[test]
    fn color_letters() {
        assert_eq!(Color::from_letter('R'), Some(Color::Red));
        assert_eq!(Color::from_letter('B'), Some(Color::Blue));
        assert_eq!(Color::from_letter('E'), None);
        assert_eq!(Color::HUMAN.opponent(), Color::ENGINE);
    }
}
