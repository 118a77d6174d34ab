use crate::board::{Color, Coord};
use crate::errors::IllegalMove;
use crate::state::GameState;

/// Validates a move request from the human client against the current state.
///
/// Checks run in a fixed order: bounds, game over, turn, then cell
/// ownership. Only the human color may be submitted through this path; the
/// engine moves by rewriting the shared state itself.
///
/// # Errors
///
/// - [`IllegalMove::OutOfBounds`] - coordinates outside the 9x6 board
/// - [`IllegalMove::GameOver`] - a winner is already known
/// - [`IllegalMove::NotYourTurn`] - `player` is not the side to move
/// - [`IllegalMove::OccupiedByOpponent`] - target cell holds opponent orbs
///
/// # Examples
///
/// ```
/// use chain_reaction_core::board::Color;
/// use chain_reaction_core::rules::validate_human_move;
/// use chain_reaction_core::state::GameState;
///
/// let state = GameState::initial();
/// let at = validate_human_move(&state, 4, 2, Color::Red).expect("legal");
/// assert_eq!((at.row(), at.col()), (4, 2));
/// assert!(validate_human_move(&state, 9, 0, Color::Red).is_err());
/// ```
pub fn validate_human_move(
    state: &GameState,
    row: i64,
    col: i64,
    player: Color,
) -> Result<Coord, IllegalMove> {
    let at = Coord::new(row, col).ok_or(IllegalMove::OutOfBounds { row, col })?;

    if let Some(winner) = state.winner() {
        return Err(IllegalMove::GameOver { winner });
    }

    if player != Color::HUMAN || state.mover() != Some(player) {
        return Err(IllegalMove::NotYourTurn);
    }

    match state.board().cell(at).owner() {
        Some(owner) if owner != player => Err(IllegalMove::OccupiedByOpponent { at }),
        _ => Ok(at),
    }
}
