use crate::board::{Board, Color};
use crate::codec::Header;
use serde::{Deserialize, Serialize};

/// Minimum orbs on the board before an elimination can be declared.
///
/// Orbs are conserved by every move, so the total equals the number of
/// applied moves. Below two, one side has not had a turn yet and a
/// one-colored board is an opening, not a win. This is stricter than a plain
/// "any orb on the board" rule, which would declare the engine the winner
/// right after its opening move in an engine-first game.
pub const MIN_ORBS_FOR_ELIMINATION: u32 = 2;

/// Turn-management phase of the game.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnState {
    /// No game has been set up yet
    Idle,
    /// Waiting for the human client to submit a move
    AwaitingHumanMove,
    /// Human move recorded, engine has not completed its turn
    AwaitingEngineMove,
    /// A winner is known
    GameOver,
}

/// Decoded game state: header, board, whose turn it is, and the winner.
///
/// `winner` and `mover` are never both set.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct GameState {
    header: Header,
    board: Board,
    mover: Option<Color>,
    winner: Option<Color>,
}

impl GameState {
    /// Builds a state from its header and board, resolving the winner.
    ///
    /// A winner in the header is taken as is. Otherwise the winner is
    /// recomputed from the board: when one color has been eliminated the
    /// other wins, whatever the header claims about the next mover.
    pub fn from_parts(header: Header, board: Board) -> Self {
        let winner = match header {
            Header::GameOver { winner } => Some(winner),
            _ => eliminated_winner(&board),
        };
        let mover = match (winner, header) {
            (Some(_), _) => None,
            (None, Header::Initializing) => Some(Color::HUMAN),
            (None, Header::HumanMoved { .. }) => Some(Color::ENGINE),
            (None, Header::EngineMoved) => Some(Color::HUMAN),
            (None, Header::GameOver { .. }) => None,
        };
        Self {
            header,
            board,
            mover,
            winner,
        }
    }

    /// Empty board under the `Initializing` header.
    pub fn initial() -> Self {
        Self::from_parts(Header::Initializing, Board::empty())
    }

    /// Gives the first move of a fresh game to the engine.
    ///
    /// Only an `Initializing` state without a winner changes; any other
    /// state already records who moved last.
    pub fn with_engine_opening(mut self) -> Self {
        if matches!(self.header, Header::Initializing) && self.winner.is_none() {
            self.mover = Some(Color::ENGINE);
        }
        self
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn mover(&self) -> Option<Color> {
        self.mover
    }

    pub fn winner(&self) -> Option<Color> {
        self.winner
    }

    pub fn turn(&self) -> TurnState {
        if self.winner.is_some() {
            return TurnState::GameOver;
        }
        match self.mover {
            Some(color) if color == Color::HUMAN => TurnState::AwaitingHumanMove,
            Some(_) => TurnState::AwaitingEngineMove,
            None => TurnState::GameOver,
        }
    }

    /// True when the header disagrees with the board about the game being over.
    pub fn winner_overrides_header(&self) -> bool {
        self.winner.is_some() && !matches!(self.header, Header::GameOver { .. })
    }
}

fn eliminated_winner(board: &Board) -> Option<Color> {
    let counts = board.orb_counts();
    if counts.total() < MIN_ORBS_FOR_ELIMINATION {
        return None;
    }
    match (counts.red, counts.blue) {
        (0, _) => Some(Color::Blue),
        (_, 0) => Some(Color::Red),
        _ => None,
    }
}
