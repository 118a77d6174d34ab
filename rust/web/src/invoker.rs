use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;

/// How long to keep draining pipes after the engine process has exited or
/// been killed.
const OUTPUT_GRACE: Duration = Duration::from_millis(500);

/// Console output captured from one engine run. Diagnostic only; the game
/// state is always re-read from the store afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineOutput {
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine timed out after {}ms", .limit.as_millis())]
    Timeout {
        limit: Duration,
        /// Whatever the engine printed before it was killed
        output: EngineOutput,
    },
    #[error("failed to launch engine {}: {source}", .path.display())]
    Launch {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("engine exited with {status}: {}", .output.stderr.trim())]
    NonZeroExit {
        status: String,
        code: Option<i32>,
        output: EngineOutput,
    },
    #[error("engine process error: {0}")]
    Wait(#[source] std::io::Error),
}

impl EngineError {
    pub fn output(&self) -> Option<&EngineOutput> {
        match self {
            EngineError::NonZeroExit { output, .. } | EngineError::Timeout { output, .. } => {
                Some(output)
            }
            _ => None,
        }
    }
}

/// Runs the external engine for one turn.
///
/// Implementations must never interpret the engine's result as game state;
/// they only report whether the run completed.
#[async_trait]
pub trait EngineInvoker: Send + Sync + fmt::Debug {
    async fn run(&self, working_dir: Option<&Path>) -> Result<EngineOutput, EngineError>;
}

/// Launches the engine as a child process with a wall-clock limit.
#[derive(Debug, Clone)]
pub struct ProcessInvoker {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl ProcessInvoker {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout,
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl EngineInvoker for ProcessInvoker {
    async fn run(&self, working_dir: Option<&Path>) -> Result<EngineOutput, EngineError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = working_dir {
            cmd.current_dir(dir);
        }

        let started = Instant::now();
        let mut child = cmd.spawn().map_err(|source| EngineError::Launch {
            path: self.program.clone(),
            source,
        })?;
        tracing::debug!(
            program = %self.program.display(),
            pid = ?child.id(),
            timeout_ms = self.timeout.as_millis() as u64,
            "engine launched"
        );

        let stdout = spawn_reader(child.stdout.take());
        let stderr = spawn_reader(child.stderr.take());

        let status = match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(Ok(status)) => status,
            Ok(Err(err)) => {
                stdout.abort();
                stderr.abort();
                return Err(EngineError::Wait(err));
            }
            Err(_) => {
                if let Err(err) = child.kill().await {
                    tracing::error!(error = %err, "failed to kill timed out engine");
                }
                // Grandchildren may keep the pipes open; `collect` stops waiting
                // after the grace period.
                let output = EngineOutput {
                    stdout: collect(stdout).await,
                    stderr: collect(stderr).await,
                    elapsed: started.elapsed(),
                };
                tracing::warn!(
                    timeout_ms = self.timeout.as_millis() as u64,
                    "engine killed after timeout"
                );
                return Err(EngineError::Timeout {
                    limit: self.timeout,
                    output,
                });
            }
        };

        let output = EngineOutput {
            stdout: collect(stdout).await,
            stderr: collect(stderr).await,
            elapsed: started.elapsed(),
        };
        finish(status, output)
    }
}

fn finish(status: ExitStatus, output: EngineOutput) -> Result<EngineOutput, EngineError> {
    if status.success() {
        tracing::debug!(
            elapsed_ms = output.elapsed.as_millis() as u64,
            stdout = %output.stdout.trim(),
            "engine completed"
        );
        return Ok(output);
    }
    Err(EngineError::NonZeroExit {
        status: status.to_string(),
        code: status.code(),
        output,
    })
}

fn spawn_reader<R>(pipe: Option<R>) -> JoinHandle<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            if let Err(err) = pipe.read_to_end(&mut buf).await {
                tracing::debug!(error = %err, "engine pipe read failed");
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

async fn collect(mut handle: JoinHandle<String>) -> String {
    match tokio::time::timeout(OUTPUT_GRACE, &mut handle).await {
        Ok(Ok(text)) => text,
        Ok(Err(_)) => String::new(),
        Err(_) => {
            handle.abort();
            String::new()
        }
    }
}
