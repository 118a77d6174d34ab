use chain_reaction_core::board::Board;
use chain_reaction_core::codec::{decode, encode, Header};
use chain_reaction_core::errors::DecodeError;
use chain_reaction_core::state::GameState;
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tempfile::NamedTempFile;
use thiserror::Error;

/// Backing location of the shared game state text.
///
/// `replace` must be atomic with respect to concurrent `load` calls: a
/// reader sees either the old or the new contents, never a mix.
pub trait StateResource: Send + Sync + fmt::Debug {
    fn load(&self) -> io::Result<String>;
    fn replace(&self, contents: &str) -> io::Result<()>;
    /// Directory the engine process should run in, if the resource lives on disk.
    fn working_dir(&self) -> Option<&Path>;
    fn describe(&self) -> String;
}

/// State file on disk, replaced by write-to-temp then rename.
#[derive(Debug, Clone)]
pub struct FileResource {
    dir: PathBuf,
    path: PathBuf,
}

impl FileResource {
    pub fn new(dir: impl Into<PathBuf>, file_name: &str) -> Self {
        let dir = dir.into();
        let path = dir.join(file_name);
        Self { dir, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateResource for FileResource {
    fn load(&self) -> io::Result<String> {
        fs::read_to_string(&self.path)
    }

    fn replace(&self, contents: &str) -> io::Result<()> {
        // Temp file in the same directory so the rename never crosses filesystems.
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(contents.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|err| err.error)?;
        Ok(())
    }

    fn working_dir(&self) -> Option<&Path> {
        Some(&self.dir)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// In-memory resource; `None` contents behave like a missing file.
#[derive(Debug, Default)]
pub struct MemoryResource {
    contents: RwLock<Option<String>>,
}

impl MemoryResource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contents(contents: impl Into<String>) -> Self {
        Self {
            contents: RwLock::new(Some(contents.into())),
        }
    }

    pub fn contents(&self) -> Option<String> {
        self.contents
            .read()
            .map(|guard| guard.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    pub fn set(&self, contents: impl Into<String>) {
        *self.lock_write() = Some(contents.into());
    }

    pub fn remove(&self) {
        *self.lock_write() = None;
    }

    fn lock_write(&self) -> std::sync::RwLockWriteGuard<'_, Option<String>> {
        self.contents
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl StateResource for MemoryResource {
    fn load(&self) -> io::Result<String> {
        self.contents()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "state not written"))
    }

    fn replace(&self, contents: &str) -> io::Result<()> {
        self.set(contents);
        Ok(())
    }

    fn working_dir(&self) -> Option<&Path> {
        None
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("state resource unavailable: {0}")]
    ResourceUnavailable(#[source] io::Error),
    #[error("state resource failed to decode: {0}")]
    DecodeFailed(#[from] DecodeError),
    #[error("failed to write state resource: {0}")]
    WriteFailed(#[source] io::Error),
}

impl StoreError {
    /// Read failures mean the state is lost and the game must be reset.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            StoreError::ResourceUnavailable(_) | StoreError::DecodeFailed(_)
        )
    }
}

/// Sole owner of the shared state resource.
#[derive(Debug, Clone)]
pub struct StateStore {
    resource: Arc<dyn StateResource>,
}

impl StateStore {
    pub fn new(resource: Arc<dyn StateResource>) -> Self {
        Self { resource }
    }

    pub fn file(dir: impl Into<PathBuf>, file_name: &str) -> Self {
        Self::new(Arc::new(FileResource::new(dir, file_name)))
    }

    pub fn read(&self) -> Result<GameState, StoreError> {
        let text = self.read_raw()?;
        Ok(decode(&text)?)
    }

    /// Raw resource text, undecoded.
    pub fn read_raw(&self) -> Result<String, StoreError> {
        self.resource.load().map_err(StoreError::ResourceUnavailable)
    }

    pub fn write(&self, board: &Board, header: &Header) -> Result<(), StoreError> {
        self.write_raw(&encode(board, header))
    }

    pub fn write_raw(&self, text: &str) -> Result<(), StoreError> {
        tracing::trace!(resource = %self.resource.describe(), bytes = text.len(), "writing state");
        self.resource.replace(text).map_err(StoreError::WriteFailed)
    }

    pub fn working_dir(&self) -> Option<&Path> {
        self.resource.working_dir()
    }

    pub fn describe(&self) -> String {
        self.resource.describe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chain_reaction_core::board::{Cell, Color, Coord};
    use chain_reaction_core::state::TurnState;

    #[test]
    fn missing_file_is_unavailable() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = StateStore::file(dir.path(), "input.txt");
        let err = store.read().unwrap_err();
        assert!(matches!(err, StoreError::ResourceUnavailable(_)));
        assert!(err.is_corruption());
    }

    #[test]
    fn garbage_is_decode_failure() {
        let store = StateStore::new(Arc::new(MemoryResource::with_contents("hello\n")));
        let err = store.read().unwrap_err();
        assert!(matches!(err, StoreError::DecodeFailed(_)));
        assert!(err.is_corruption());
    }

    #[test]
    fn file_write_replaces_contents() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = StateStore::file(dir.path(), "input.txt");

        store
            .write(&Board::empty(), &Header::Initializing)
            .expect("first write");

        let mut board = Board::empty();
        board.set(
            Coord::new(2, 3).unwrap(),
            Cell::occupied(1, Color::Red).unwrap(),
        );
        store
            .write(
                &board,
                &Header::HumanMoved {
                    at: Coord::new(2, 3),
                },
            )
            .expect("second write");

        let state = store.read().expect("read back");
        assert_eq!(state.board(), &board);
        assert_eq!(state.turn(), TurnState::AwaitingEngineMove);

        let raw = fs::read_to_string(dir.path().join("input.txt")).expect("raw");
        assert!(raw.starts_with("Human Move: 2 3\n"));

        // Only the state file remains; temp files were renamed away.
        let entries = fs::read_dir(dir.path()).expect("read dir").count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn file_store_reports_working_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = StateStore::file(dir.path(), "input.txt");
        assert_eq!(store.working_dir(), Some(dir.path()));

        let memory = StateStore::new(Arc::new(MemoryResource::new()));
        assert_eq!(memory.working_dir(), None);
    }
}
