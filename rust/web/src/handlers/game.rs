use crate::coordinator::{CoordinatorError, MoveRequest, TurnCoordinator};
use chain_reaction_core::board::{Cell, Color};
use chain_reaction_core::state::{GameState, TurnState};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use warp::http::StatusCode;
use warp::reply::{self, Response};
use warp::Reply;

/// Body of `POST /api/move`.
#[derive(Debug, Clone, Deserialize)]
pub struct MoveBody {
    pub row: i64,
    pub col: i64,
    /// Submitting color; only the human color is accepted
    #[serde(default)]
    pub player: Option<Color>,
}

impl MoveBody {
    fn into_request(self) -> MoveRequest {
        MoveRequest {
            row: self.row,
            col: self.col,
            player: self.player.unwrap_or(Color::HUMAN),
        }
    }
}

/// One cell as the browser client draws it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CellView {
    pub count: u32,
    /// `R`, `B`, or `E` for empty
    pub color: char,
}

impl From<Cell> for CellView {
    fn from(cell: Cell) -> Self {
        Self {
            count: cell.count(),
            color: cell.owner().map(Color::letter).unwrap_or('E'),
        }
    }
}

/// JSON view of a [`GameState`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GameStateResponse {
    pub header: String,
    pub grid: Vec<Vec<CellView>>,
    /// Side to move, `N` once the game is over
    pub current_player: char,
    /// `R`, `B`, or `N` while undecided
    pub winner: char,
    pub phase: TurnState,
}

impl From<&GameState> for GameStateResponse {
    fn from(state: &GameState) -> Self {
        Self {
            header: state.header().to_string(),
            grid: state
                .board()
                .rows()
                .map(|row| row.iter().copied().map(CellView::from).collect())
                .collect(),
            current_player: state.mover().map(Color::letter).unwrap_or('N'),
            winner: state.winner().map(Color::letter).unwrap_or('N'),
            phase: state.turn(),
        }
    }
}

/// Returns the current game state.
///
/// # HTTP Method and Path
/// - **Method**: GET
/// - **Path**: `/api/state`
///
/// Always `200 OK`. An unreadable state resource is replaced by a fresh game
/// before responding.
pub async fn get_state(coordinator: Arc<TurnCoordinator>) -> Response {
    let state = coordinator.state().await;
    success_response(StatusCode::OK, &GameStateResponse::from(&state))
}

/// Plays a human move and waits for the engine's reply.
///
/// # HTTP Method and Path
/// - **Method**: POST
/// - **Path**: `/api/move`
///
/// # Request Format
/// ```json
/// { "row": 4, "col": 2 }
/// ```
///
/// # Response
/// - `200 OK`: state after the engine's turn
/// - `400 Bad Request`: `illegal_move`, nothing changed
/// - `409 Conflict`: `busy`, another move or reset is running
/// - `500 Internal Server Error`: `engine_failed`, human move kept
/// - `504 Gateway Timeout`: `engine_timeout`, human move kept
pub async fn submit_move(coordinator: Arc<TurnCoordinator>, body: MoveBody) -> Response {
    match coordinator.submit_move(body.into_request()).await {
        Ok(state) => success_response(StatusCode::OK, &GameStateResponse::from(&state)),
        Err(err) => coordinator_error(err),
    }
}

/// Starts a new game. `POST /api/reset`.
pub async fn reset(coordinator: Arc<TurnCoordinator>) -> Response {
    match coordinator.reset().await {
        Ok(state) => success_response(StatusCode::OK, &GameStateResponse::from(&state)),
        Err(err) => coordinator_error(err),
    }
}

/// Re-runs the engine for an unanswered human move. `POST /api/engine/retry`.
pub async fn retry_engine(coordinator: Arc<TurnCoordinator>) -> Response {
    match coordinator.retry_engine().await {
        Ok(state) => success_response(StatusCode::OK, &GameStateResponse::from(&state)),
        Err(err) => coordinator_error(err),
    }
}

fn success_response<T>(status: StatusCode, body: &T) -> Response
where
    T: Serialize,
{
    reply::with_status(reply::json(body), status).into_response()
}

fn coordinator_error(err: CoordinatorError) -> Response {
    use crate::errors::IntoErrorResponse;
    err.into_http_response()
}
