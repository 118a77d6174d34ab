#![allow(dead_code)]

use async_trait::async_trait;
use chain_reaction_core::board::{Board, Cell, Color, Coord, COLS, ROWS};
use chain_reaction_core::codec::{decode, encode, Header};
use chain_reaction_web::{
    AppContext, EngineError, EngineInvoker, EngineOutput, MemoryResource, ServiceConfig,
    StateStore,
};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

/// What the fake engine does on one run.
#[derive(Debug)]
pub enum Step {
    /// Apply the pending human move and answer with one engine orb
    Reply,
    /// Signal `started`, wait for `release`, then reply
    Hold,
    /// Exit nonzero without touching the state
    Fail,
    /// Report a timeout, with some stderr, without touching the state
    Timeout,
    /// Overwrite the state with arbitrary text and succeed
    Write(String),
}

/// In-process engine working on a [`MemoryResource`].
///
/// Runs its queued steps in order, then replies forever.
#[derive(Debug)]
pub struct FakeEngine {
    resource: Arc<MemoryResource>,
    plan: Mutex<VecDeque<Step>>,
    runs: AtomicUsize,
    pub started: Notify,
    pub release: Notify,
}

impl FakeEngine {
    pub fn new(resource: Arc<MemoryResource>, plan: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            resource,
            plan: Mutex::new(plan.into()),
            runs: AtomicUsize::new(0),
            started: Notify::new(),
            release: Notify::new(),
        })
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    fn next_step(&self) -> Step {
        self.plan.lock().unwrap().pop_front().unwrap_or(Step::Reply)
    }

    fn reply(&self) {
        let input = self.resource.contents().unwrap_or_default();
        self.resource.set(engine_reply(&input));
    }
}

#[async_trait]
impl EngineInvoker for FakeEngine {
    async fn run(&self, _working_dir: Option<&Path>) -> Result<EngineOutput, EngineError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        match self.next_step() {
            Step::Reply => self.reply(),
            Step::Hold => {
                self.started.notify_one();
                self.release.notified().await;
                self.reply();
            }
            Step::Fail => {
                return Err(EngineError::NonZeroExit {
                    status: "exit status: 1".to_string(),
                    code: Some(1),
                    output: EngineOutput {
                        stdout: "thinking\n".to_string(),
                        stderr: "engine crashed\n".to_string(),
                        elapsed: Duration::from_millis(3),
                    },
                })
            }
            Step::Timeout => {
                return Err(EngineError::Timeout {
                    limit: Duration::from_millis(100),
                    output: EngineOutput {
                        stdout: String::new(),
                        stderr: "still searching\n".to_string(),
                        elapsed: Duration::from_millis(100),
                    },
                })
            }
            Step::Write(text) => self.resource.set(text),
        }
        Ok(EngineOutput::default())
    }
}

/// Applies the human move in `input` (no explosions) and places one engine
/// orb on the last empty cell.
pub fn engine_reply(input: &str) -> String {
    let state = decode(input).expect("engine input decodes");
    let mut board = state.board().clone();
    if let Header::HumanMoved { at: Some(at) } = state.header() {
        let cell = board.cell(*at);
        board.set(*at, Cell::occupied(cell.count() + 1, Color::Red).unwrap());
    }
    let target = (0..ROWS as i64)
        .rev()
        .flat_map(|row| (0..COLS as i64).rev().map(move |col| (row, col)))
        .filter_map(|(row, col)| Coord::new(row, col))
        .find(|at| board.cell(*at).is_empty())
        .expect("board has an empty cell");
    board.set(target, Cell::occupied(1, Color::Blue).unwrap());
    encode(&board, &Header::EngineMoved)
}

/// Context over an in-memory state with a fake engine.
pub struct Harness {
    pub context: AppContext,
    pub resource: Arc<MemoryResource>,
    pub engine: Arc<FakeEngine>,
}

pub fn harness(plan: Vec<Step>) -> Harness {
    harness_with(MemoryResource::new(), plan)
}

pub fn harness_with(resource: MemoryResource, plan: Vec<Step>) -> Harness {
    let resource = Arc::new(resource);
    let engine = FakeEngine::new(Arc::clone(&resource), plan);
    let context = AppContext::from_parts(
        ServiceConfig::for_tests("."),
        StateStore::new(resource.clone()),
        engine.clone(),
    );
    Harness {
        context,
        resource,
        engine,
    }
}

/// Board text with orbs of a single color and an `AI Move:` header.
pub fn one_color_board(color: Color, cells: &[(i64, i64, u32)]) -> String {
    let mut board = Board::empty();
    for &(row, col, count) in cells {
        board.set(
            Coord::new(row, col).unwrap(),
            Cell::occupied(count, color).unwrap(),
        );
    }
    encode(&board, &Header::EngineMoved)
}
