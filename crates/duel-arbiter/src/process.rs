//! Engine subprocess handle with bounded-wait line reads.
//!
//! Each engine runs as a child process with piped stdin/stdout. A dedicated
//! reader thread pumps stdout lines into a channel, so a read can be bounded
//! by `recv_timeout` and abandoned without leaking the process: the thread
//! exits on its own when the pipe closes.
//!
//! # Lifecycle
//!
//! 1. Spawn the engine with [`EngineProcess::spawn`]
//! 2. Exchange lines with [`EngineProcess::send_line`] and
//!    [`EngineProcess::read_line`]
//! 3. Clean up with [`EngineProcess::terminate`] (also run by [`Drop`] as a
//!    backstop)

use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when spawning or writing to an engine process.
#[derive(Error, Debug)]
pub enum ProcessError {
    /// The executable is missing or not runnable.
    #[error("failed to spawn engine: {0}")]
    Spawn(#[source] std::io::Error),
    /// The engine's stdio pipes could not be acquired after spawn.
    #[error("engine stdio unavailable")]
    Pipes,
    /// Writing to the engine's stdin failed, typically because the process
    /// has already exited (broken pipe).
    #[error("failed to write to engine: {0}")]
    Write(#[source] std::io::Error),
}

/// Result of a bounded-wait read from the engine's stdout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// A complete line arrived within the timeout (trimmed).
    Line(String),
    /// No line arrived within the timeout; the process may still be running.
    TimedOut,
    /// The stream is closed: the process exited or closed its stdout.
    Closed,
}

/// Owns one spawned engine process and its stdio streams.
///
/// The handle is exclusively owned by the session driving the game and is
/// terminated on every exit path; [`Drop`] repeats the termination so the
/// child can never outlive the handle.
pub struct EngineProcess {
    child: Child,
    stdin: ChildStdin,
    lines: Receiver<String>,
    terminated: bool,
}

impl EngineProcess {
    /// Spawns an engine process with piped stdin/stdout.
    ///
    /// Stderr is discarded. A reader thread is started that forwards stdout
    /// lines into the channel served by [`read_line`](Self::read_line).
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::Spawn`] if the executable cannot be started.
    pub fn spawn<P: AsRef<Path>>(path: P, args: &[String]) -> Result<Self, ProcessError> {
        let mut child = Command::new(path.as_ref())
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(ProcessError::Spawn)?;

        let stdin = child.stdin.take().ok_or(ProcessError::Pipes)?;
        let stdout = child.stdout.take().ok_or(ProcessError::Pipes)?;

        let (tx, rx) = mpsc::channel::<String>();
        thread::spawn(move || {
            let reader = BufReader::new(stdout);
            for line in reader.lines() {
                match line {
                    Ok(l) => {
                        if tx.send(l).is_err() {
                            break;
                        }
                    }
                    Err(_) => break,
                }
            }
        });

        Ok(Self {
            child,
            stdin,
            lines: rx,
            terminated: false,
        })
    }

    /// Writes `text` plus a newline to the engine's stdin and flushes.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::Write`] if the pipe is broken.
    pub fn send_line(&mut self, text: &str) -> Result<(), ProcessError> {
        writeln!(self.stdin, "{}", text).map_err(ProcessError::Write)?;
        self.stdin.flush().map_err(ProcessError::Write)
    }

    /// Waits up to `timeout` for one full line from the engine's stdout.
    ///
    /// Never blocks past the timeout. Returns [`ReadOutcome::Closed`] once
    /// the process has exited and the buffered lines are drained.
    pub fn read_line(&mut self, timeout: Duration) -> ReadOutcome {
        match self.lines.recv_timeout(timeout) {
            Ok(line) => ReadOutcome::Line(line.trim().to_string()),
            Err(RecvTimeoutError::Timeout) => ReadOutcome::TimedOut,
            Err(RecvTimeoutError::Disconnected) => ReadOutcome::Closed,
        }
    }

    /// Whether the process is still running.
    pub fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Kills and reaps the process. Idempotent.
    pub fn terminate(&mut self) {
        if self.terminated {
            return;
        }
        self.terminated = true;
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

impl Drop for EngineProcess {
    fn drop(&mut self) {
        self.terminate();
    }
}
