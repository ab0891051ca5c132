//! Typed external commands and the runner that executes them.
//!
//! The pipeline never knows what a collaborator does internally. It builds a
//! [`CommandSpec`], hands it to a [`CommandRunner`] together with a log sink,
//! and gets back an [`ExitStatus`]. Output artifacts (the dataset file, the
//! model directory) are a side-effect contract, not a return value.

use crate::error::{Result, RetrainError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::time::{Duration, Instant};

// ---------------------------------------------------------------------------
// CommandSpec
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct CommandSpec {
    /// Short label used in logs ("export", "train").
    pub name: String,
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    /// `None` waits for the process indefinitely.
    pub timeout: Option<Duration>,
    /// What the command promises to leave behind on exit 0.
    pub contract: String,
}

impl CommandSpec {
    pub fn display_line(&self) -> String {
        let mut parts = vec![self.program.clone()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

// ---------------------------------------------------------------------------
// ExitStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExitStatus {
    Success,
    /// `code` is `None` when the process was killed by a signal.
    Failed { code: Option<i32> },
    TimedOut { after: Duration },
}

impl ExitStatus {
    pub fn success(self) -> bool {
        matches!(self, ExitStatus::Success)
    }

    fn from_std(status: std::process::ExitStatus) -> Self {
        if status.success() {
            ExitStatus::Success
        } else {
            ExitStatus::Failed {
                code: status.code(),
            }
        }
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitStatus::Success => f.write_str("exited with code 0"),
            ExitStatus::Failed { code: Some(c) } => write!(f, "exited with code {c}"),
            ExitStatus::Failed { code: None } => f.write_str("was terminated by a signal"),
            ExitStatus::TimedOut { after } => write!(f, "timed out after {after:?}"),
        }
    }
}

// ---------------------------------------------------------------------------
// CommandRunner
// ---------------------------------------------------------------------------

/// Executes external collaborators.
///
/// `Err` means the command could not be run at all (missing program, spawn
/// failure). A command that ran and failed is `Ok(ExitStatus::Failed { .. })`.
pub trait CommandRunner {
    fn run(&self, spec: &CommandSpec, log: &mut dyn Write) -> Result<ExitStatus>;
}

/// Runs commands as real child processes.
///
/// stdout and stderr are read on dedicated threads and merged line by line
/// into the log sink in arrival order. Each child leads its own process
/// group, so a timeout kills everything it spawned.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

enum Event {
    Line(String),
    Exited(std::io::Result<std::process::ExitStatus>),
}

impl CommandRunner for ProcessRunner {
    fn run(&self, spec: &CommandSpec, log: &mut dyn Write) -> Result<ExitStatus> {
        let program = which::which(&spec.program).map_err(|e| RetrainError::CommandSpawn {
            program: spec.program.clone(),
            reason: e.to_string(),
        })?;

        let mut cmd = Command::new(program);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &spec.working_dir {
            cmd.current_dir(dir);
        }
        #[cfg(unix)]
        std::os::unix::process::CommandExt::process_group(&mut cmd, 0);

        let mut child = cmd.spawn().map_err(|e| RetrainError::CommandSpawn {
            program: spec.program.clone(),
            reason: e.to_string(),
        })?;
        let child_pid = child.id();
        tracing::debug!(command = %spec.name, pid = child_pid, "spawned");

        let (tx, rx) = mpsc::channel::<Event>();
        let readers = [
            child.stdout.take().map(|s| forward_lines(s, tx.clone())),
            child.stderr.take().map(|s| forward_lines(s, tx.clone())),
        ];
        let waiter_tx = tx;
        std::thread::spawn(move || {
            let _ = waiter_tx.send(Event::Exited(child.wait()));
        });

        let deadline = spec.timeout.map(|t| Instant::now() + t);
        let exited = loop {
            let event = match deadline {
                None => rx.recv().ok(),
                Some(d) => {
                    let remaining = d.saturating_duration_since(Instant::now());
                    match rx.recv_timeout(remaining) {
                        Ok(ev) => Some(ev),
                        Err(mpsc::RecvTimeoutError::Timeout) => {
                            kill_group(child_pid);
                            let after = spec.timeout.unwrap_or_default();
                            // The child must be reaped before the caller touches
                            // anything it may have been writing.
                            if !await_exit(&rx, log)? {
                                tracing::error!(command = %spec.name, pid = child_pid, "killed process was not reaped");
                            }
                            writeln!(log, "[{}] killed: timed out after {after:?}", spec.name)?;
                            log.flush()?;
                            tracing::warn!(command = %spec.name, after = ?after, "command timed out");
                            return Ok(ExitStatus::TimedOut { after });
                        }
                        Err(mpsc::RecvTimeoutError::Disconnected) => None,
                    }
                }
            };
            match event {
                Some(Event::Line(line)) => writeln!(log, "{line}")?,
                Some(Event::Exited(status)) => break status,
                None => {
                    return Err(RetrainError::CommandSpawn {
                        program: spec.program.clone(),
                        reason: "lost track of child process".to_string(),
                    })
                }
            }
        };

        // Pipes close on exit; wait for readers so no trailing output is lost.
        for reader in readers.into_iter().flatten() {
            let _ = reader.join();
        }
        for event in rx.try_iter() {
            if let Event::Line(line) = event {
                writeln!(log, "{line}")?;
            }
        }
        log.flush()?;

        Ok(ExitStatus::from_std(exited?))
    }
}

fn forward_lines<R: Read + Send + 'static>(
    stream: R,
    tx: mpsc::Sender<Event>,
) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        let reader = BufReader::new(stream);
        for line in reader.split(b'\n') {
            let Ok(bytes) = line else { break };
            let text = String::from_utf8_lossy(&bytes).trim_end_matches('\r').to_string();
            if tx.send(Event::Line(text)).is_err() {
                break;
            }
        }
    })
}

/// Drain events until the child is reaped. Returns false if it was not
/// reaped within [`REAP_GRACE`].
fn await_exit(rx: &mpsc::Receiver<Event>, log: &mut dyn Write) -> Result<bool> {
    let deadline = Instant::now() + REAP_GRACE;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(remaining) {
            Ok(Event::Line(line)) => writeln!(log, "{line}")?,
            Ok(Event::Exited(_)) => return Ok(true),
            Err(_) => return Ok(false),
        }
    }
}

const REAP_GRACE: Duration = Duration::from_secs(10);

/// SIGKILL the process group led by `pgid`. Best-effort; errors are ignored.
fn kill_group(pgid: u32) {
    let _ = Command::new("kill")
        .args(["-9", "--", &format!("-{pgid}")])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
}
