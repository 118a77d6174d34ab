//! Turn coordination between the human client and the external engine.
//!
//! The coordinator is the only component that sequences writes to the
//! shared state. Every mutating operation (move, reset, engine retry) runs
//! inside one critical section covering the full write -> engine -> read
//! sequence. A second mutating request that arrives meanwhile is refused
//! with [`CoordinatorError::Busy`] instead of waiting, because the engine
//! process rewrites the same resource without any locking of its own.
//!
//! Queries do not take the critical section. They may observe a state in
//! the middle of a sequence (for example the human's move before the engine
//! has answered), which is expected.

use crate::invoker::{EngineError, EngineInvoker, EngineOutput};
use crate::store::{StateStore, StoreError};
use chain_reaction_core::board::{Board, Color};
use chain_reaction_core::codec::{encode, Header};
use chain_reaction_core::errors::IllegalMove;
use chain_reaction_core::rules::validate_human_move;
use chain_reaction_core::state::{GameState, TurnState};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::Instrument;
use uuid::Uuid;

/// A move submitted by a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveRequest {
    pub row: i64,
    pub col: i64,
    pub player: Color,
}

impl MoveRequest {
    pub fn human(row: i64, col: i64) -> Self {
        Self {
            row,
            col,
            player: Color::HUMAN,
        }
    }
}

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error(transparent)]
    IllegalMove(#[from] IllegalMove),
    #[error("a move or reset is already in progress")]
    Busy,
    #[error("engine did not finish within {}ms", .limit.as_millis())]
    EngineTimeout {
        limit: Duration,
        output: EngineOutput,
    },
    #[error("engine failed: {0}")]
    EngineFailed(#[source] EngineError),
    #[error("no engine move is pending (game is {state:?})")]
    NoPendingEngineMove { state: TurnState },
    #[error(transparent)]
    Storage(#[from] StoreError),
}

#[derive(Debug)]
pub struct TurnCoordinator {
    store: StateStore,
    invoker: Arc<dyn EngineInvoker>,
    engine_first: bool,
    sequence: Mutex<()>,
    last_good: RwLock<Option<GameState>>,
}

impl TurnCoordinator {
    pub fn new(store: StateStore, invoker: Arc<dyn EngineInvoker>, engine_first: bool) -> Self {
        Self {
            store,
            invoker,
            engine_first,
            sequence: Mutex::new(()),
            last_good: RwLock::new(None),
        }
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn engine_first(&self) -> bool {
        self.engine_first
    }

    /// Phase as of the last state this coordinator observed or wrote.
    pub fn turn_state(&self) -> TurnState {
        self.last_good()
            .map(|state| state.turn())
            .unwrap_or(TurnState::Idle)
    }

    /// Starts a fresh game at process start. Waits for the critical section
    /// rather than failing with `Busy`.
    pub async fn initialize(&self) -> Result<GameState, CoordinatorError> {
        let _guard = self.sequence.lock().await;
        tracing::info!(
            resource = %self.store.describe(),
            engine_first = self.engine_first,
            "initializing game"
        );
        self.reset_locked().await
    }

    /// Current game state. Never fails: an unreadable resource is replaced
    /// by a fresh game, unless a sequence is in flight, in which case the
    /// last good state is served.
    pub async fn state(&self) -> GameState {
        match self.store.read() {
            Ok(state) => self.observe(state),
            Err(err) => match self.sequence.try_lock() {
                Ok(guard) => {
                    let state = self.read_locked().await;
                    drop(guard);
                    state
                }
                Err(_) => {
                    tracing::debug!(
                        error = %err,
                        "state unreadable while a sequence is in flight; serving last known state"
                    );
                    self.last_good().unwrap_or_else(|| self.fresh_game())
                }
            },
        }
    }

    /// Validates and records a human move, then runs the engine's reply.
    ///
    /// On engine failure the human move stays in the resource and the turn
    /// does not advance, so [`TurnCoordinator::retry_engine`] can finish it.
    pub async fn submit_move(&self, request: MoveRequest) -> Result<GameState, CoordinatorError> {
        let _guard = self.sequence.try_lock().map_err(|_| CoordinatorError::Busy)?;
        let span = tracing::info_span!(
            "move_sequence",
            sequence_id = %Uuid::new_v4(),
            row = request.row,
            col = request.col
        );

        async {
            let current = self.read_locked().await;
            let at = match validate_human_move(&current, request.row, request.col, request.player)
            {
                Ok(at) => at,
                Err(illegal) => {
                    tracing::info!(reason = %illegal, "move rejected");
                    return Err(illegal.into());
                }
            };

            let header = Header::HumanMoved { at: Some(at) };
            let snapshot = encode(current.board(), &header);
            self.store.write_raw(&snapshot)?;
            self.remember(GameState::from_parts(header, current.board().clone()));
            tracing::info!("human move recorded");

            self.engine_turn(&snapshot).await
        }
        .instrument(span)
        .await
    }

    /// Writes an empty board and, if the engine opens, runs its first move.
    pub async fn reset(&self) -> Result<GameState, CoordinatorError> {
        let _guard = self.sequence.try_lock().map_err(|_| CoordinatorError::Busy)?;
        let span = tracing::info_span!("reset_sequence", sequence_id = %Uuid::new_v4());
        self.reset_locked().instrument(span).await
    }

    /// Re-runs the engine for a human move it has not answered yet.
    pub async fn retry_engine(&self) -> Result<GameState, CoordinatorError> {
        let _guard = self.sequence.try_lock().map_err(|_| CoordinatorError::Busy)?;
        let span = tracing::info_span!("retry_sequence", sequence_id = %Uuid::new_v4());

        async {
            let current = self.read_locked().await;
            if current.turn() != TurnState::AwaitingEngineMove {
                return Err(CoordinatorError::NoPendingEngineMove {
                    state: current.turn(),
                });
            }
            tracing::info!("retrying engine turn");
            let snapshot = encode(current.board(), current.header());
            self.engine_turn(&snapshot).await
        }
        .instrument(span)
        .await
    }

    async fn reset_locked(&self) -> Result<GameState, CoordinatorError> {
        self.write_initial()?;
        tracing::info!(engine_first = self.engine_first, "game reset");
        if self.engine_first {
            let snapshot = encode(&Board::empty(), &Header::Initializing);
            return self.engine_turn(&snapshot).await;
        }
        self.read_after_sequence()
    }

    async fn engine_turn(&self, snapshot: &str) -> Result<GameState, CoordinatorError> {
        match self.run_engine().await {
            Ok(()) => self.read_after_sequence(),
            Err(err) => {
                self.restore_snapshot(snapshot);
                Err(err)
            }
        }
    }

    async fn run_engine(&self) -> Result<(), CoordinatorError> {
        match self.invoker.run(self.store.working_dir()).await {
            Ok(output) => {
                tracing::info!(
                    elapsed_ms = output.elapsed.as_millis() as u64,
                    "engine turn completed"
                );
                Ok(())
            }
            Err(EngineError::Timeout { limit, output }) => {
                tracing::error!(
                    timeout_ms = limit.as_millis() as u64,
                    stdout = %output.stdout.trim(),
                    stderr = %output.stderr.trim(),
                    "engine timed out"
                );
                Err(CoordinatorError::EngineTimeout { limit, output })
            }
            Err(err) => {
                tracing::error!(
                    error = %err,
                    stderr = %err.output().map(|o| o.stderr.trim()).unwrap_or_default(),
                    "engine failed"
                );
                Err(CoordinatorError::EngineFailed(err))
            }
        }
    }

    /// Puts the pre-engine text back if a failed engine run changed it.
    fn restore_snapshot(&self, snapshot: &str) {
        let current = self.store.read_raw().ok();
        if current.as_deref() == Some(snapshot) {
            return;
        }
        tracing::warn!("engine failed after touching the state; restoring the previous state");
        if let Err(err) = self.store.write_raw(snapshot) {
            tracing::error!(error = %err, "failed to restore the previous state");
        }
    }

    /// Reads the state at the end of a sequence. Corruption at this point
    /// came from the engine and resets the board without running it again.
    fn read_after_sequence(&self) -> Result<GameState, CoordinatorError> {
        match self.store.read() {
            Ok(state) => Ok(self.observe(state)),
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    resource = %self.store.describe(),
                    "state unreadable after engine run; resetting game"
                );
                self.write_initial()?;
                Ok(self.fresh_game())
            }
        }
    }

    /// Reads the state inside the critical section, healing corruption.
    async fn read_locked(&self) -> GameState {
        match self.store.read() {
            Ok(state) => self.observe(state),
            Err(err) => self.heal(&err).await,
        }
    }

    async fn heal(&self, cause: &StoreError) -> GameState {
        tracing::warn!(
            error = %cause,
            resource = %self.store.describe(),
            "shared state lost or corrupt; resetting game"
        );
        match self.reset_locked().await {
            Ok(state) => state,
            Err(err) => {
                tracing::error!(error = %err, "reset after corruption did not complete");
                self.store
                    .read()
                    .map(|state| self.observe(state))
                    .unwrap_or_else(|_| self.fresh_game())
            }
        }
    }

    fn write_initial(&self) -> Result<(), StoreError> {
        self.store.write(&Board::empty(), &Header::Initializing)?;
        self.remember(self.fresh_game());
        Ok(())
    }

    /// Empty board with the configured side to open.
    fn fresh_game(&self) -> GameState {
        self.opening(GameState::initial())
    }

    /// An `Initializing` board is the engine's turn when the engine opens, so
    /// a failed opening run stays retryable and the human cannot take it.
    fn opening(&self, state: GameState) -> GameState {
        if self.engine_first {
            state.with_engine_opening()
        } else {
            state
        }
    }

    fn observe(&self, state: GameState) -> GameState {
        let state = self.opening(state);
        if state.winner_overrides_header() {
            tracing::info!(
                header = %state.header(),
                winner = ?state.winner(),
                "board shows an eliminated color; overriding header"
            );
        }
        self.remember(state.clone());
        state
    }

    fn remember(&self, state: GameState) {
        let mut guard = self
            .last_good
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Some(state);
    }

    fn last_good(&self) -> Option<GameState> {
        self.last_good
            .read()
            .map(|guard| guard.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

impl crate::errors::IntoErrorResponse for CoordinatorError {
    fn status_code(&self) -> warp::http::StatusCode {
        use warp::http::StatusCode;
        match self {
            CoordinatorError::IllegalMove(_) => StatusCode::BAD_REQUEST,
            CoordinatorError::Busy => StatusCode::CONFLICT,
            CoordinatorError::NoPendingEngineMove { .. } => StatusCode::CONFLICT,
            CoordinatorError::EngineTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            CoordinatorError::EngineFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            CoordinatorError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            CoordinatorError::IllegalMove(_) => "illegal_move",
            CoordinatorError::Busy => "busy",
            CoordinatorError::NoPendingEngineMove { .. } => "no_pending_engine_move",
            CoordinatorError::EngineTimeout { .. } => "engine_timeout",
            CoordinatorError::EngineFailed(_) => "engine_failed",
            CoordinatorError::Storage(_) => "storage_error",
        }
    }

    fn error_message(&self) -> String {
        self.to_string()
    }

    fn error_details(&self) -> Option<serde_json::Value> {
        match self {
            CoordinatorError::IllegalMove(IllegalMove::OutOfBounds { row, col }) => {
                Some(serde_json::json!({ "row": row, "col": col }))
            }
            CoordinatorError::IllegalMove(IllegalMove::GameOver { winner }) => {
                Some(serde_json::json!({ "winner": winner }))
            }
            CoordinatorError::NoPendingEngineMove { state } => {
                Some(serde_json::json!({ "phase": state }))
            }
            CoordinatorError::EngineTimeout { limit, output } => Some(serde_json::json!({
                "timeout_ms": limit.as_millis() as u64,
                "stdout": output.stdout,
                "stderr": output.stderr,
            })),
            CoordinatorError::EngineFailed(err) => {
                let mut details = serde_json::json!({ "reason": err.to_string() });
                if let Some(output) = err.output() {
                    details["stdout"] = serde_json::Value::from(output.stdout.clone());
                    details["stderr"] = serde_json::Value::from(output.stderr.clone());
                }
                if let EngineError::NonZeroExit { code, .. } = err {
                    details["exit_code"] = serde_json::json!(code);
                }
                Some(details)
            }
            _ => None,
        }
    }

    fn severity(&self) -> crate::errors::ErrorSeverity {
        use crate::errors::ErrorSeverity;
        match self {
            CoordinatorError::Storage(_) => ErrorSeverity::Critical,
            CoordinatorError::EngineTimeout { .. } | CoordinatorError::EngineFailed(_) => {
                ErrorSeverity::Server
            }
            _ => ErrorSeverity::Client,
        }
    }
}
