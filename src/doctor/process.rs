//! Child process execution for doctor steps.

use log::{debug, warn};
use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;

/// A fully resolved command to run.
#[derive(Debug, Clone, Default)]
pub struct CommandSpec {
    pub argv: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: Vec<(String, String)>,
    pub timeout: Option<Duration>,
}

/// What a finished (or killed) command produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepOutput {
    /// `None` when the process was killed by a signal or timed out
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    pub wall_ms: u64,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl StepOutput {
    pub fn succeeded(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DoctorError {
    #[error("command argv must not be empty")]
    EmptyArgv,

    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("failed while waiting for '{program}': {source}")]
    Wait {
        program: String,
        #[source]
        source: io::Error,
    },
}

/// Runs commands. Implemented with tokio for real use and faked in tests.
#[allow(async_fn_in_trait)]
pub trait ProcessRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<StepOutput, DoctorError>;
}

/// Runs commands as tokio child processes, capping captured output.
#[derive(Debug, Clone)]
pub struct TokioProcessRunner {
    pub output_cap_bytes: usize,
}

impl TokioProcessRunner {
    pub fn new(output_cap_bytes: usize) -> Self {
        Self { output_cap_bytes }
    }
}

impl Default for TokioProcessRunner {
    fn default() -> Self {
        Self::new(16 * 1024)
    }
}

impl ProcessRunner for TokioProcessRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<StepOutput, DoctorError> {
        let (program, args) = spec.argv.split_first().ok_or(DoctorError::EmptyArgv)?;

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &spec.cwd {
            cmd.current_dir(cwd);
        }
        for (key, value) in &spec.env {
            cmd.env(key, value);
        }

        let start = Instant::now();
        let mut child = cmd.spawn().map_err(|source| DoctorError::Spawn {
            program: program.clone(),
            source,
        })?;

        let stdout = CappedCapture::start(child.stdout.take(), self.output_cap_bytes);
        let stderr = CappedCapture::start(child.stderr.take(), self.output_cap_bytes);

        let status = match spec.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
                Ok(status) => status,
                Err(_) => {
                    if let Err(e) = child.kill().await {
                        warn!("failed to kill '{}' after timeout: {}", program, e);
                    }
                    let mut stderr = stderr.abort();
                    if !stderr.is_empty() && !stderr.ends_with(b"\n") {
                        stderr.push(b'\n');
                    }
                    stderr.extend(format!("timed out after {:?}", limit).into_bytes());
                    return Ok(StepOutput {
                        exit_code: None,
                        timed_out: true,
                        wall_ms: elapsed_ms(start),
                        stdout: stdout.abort(),
                        stderr,
                    });
                }
            },
            None => child.wait().await,
        }
        .map_err(|source| DoctorError::Wait {
            program: program.clone(),
            source,
        })?;

        Ok(StepOutput {
            exit_code: status.code(),
            timed_out: false,
            wall_ms: elapsed_ms(start),
            stdout: stdout.finish().await,
            stderr: stderr.finish().await,
        })
    }
}

/// Drains one child pipe in the background, keeping at most `cap` bytes.
///
/// The pipe is read to the end so the child never blocks on a full buffer.
struct CappedCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
    task: JoinHandle<()>,
}

impl CappedCapture {
    fn start<R>(stream: Option<R>, cap: usize) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&buffer);
        let task = tokio::spawn(async move {
            let Some(mut stream) = stream else {
                return;
            };
            let mut chunk = [0u8; 4096];
            loop {
                let n = match stream.read(&mut chunk).await {
                    Ok(0) => break,
                    Ok(n) => n,
                    Err(e) => {
                        debug!("stopped reading child output: {}", e);
                        break;
                    }
                };
                if let Ok(mut out) = sink.lock() {
                    let room = cap.saturating_sub(out.len());
                    out.extend_from_slice(&chunk[..n.min(room)]);
                }
            }
        });
        Self { buffer, task }
    }

    /// Waits for the pipe to close and returns what was kept.
    async fn finish(self) -> Vec<u8> {
        let Self { buffer, task } = self;
        if let Err(e) = task.await {
            debug!("output reader ended abnormally: {}", e);
        }
        Self::take(&buffer)
    }

    /// Stops reading and returns whatever arrived so far.
    fn abort(self) -> Vec<u8> {
        self.task.abort();
        Self::take(&self.buffer)
    }

    fn take(buffer: &Mutex<Vec<u8>>) -> Vec<u8> {
        buffer.lock().map(|mut b| std::mem::take(&mut *b)).unwrap_or_default()
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
