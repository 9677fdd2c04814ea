//! External command execution.
//!
//! Engine code reaches external tools only through the [`Executor`] trait so
//! that tests can substitute canned results.
use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

/// Interval between exit-status polls while a child is running.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Result of a command execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecResult {
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// `true` when the process exited with status zero.
    pub success: bool,
    /// Exit code; `None` when killed by a signal or on timeout.
    pub code: Option<i32>,
    /// `true` when the process was killed for exceeding its timeout.
    pub timed_out: bool,
}

impl ExecResult {
    /// Stdout and stderr joined for display, trimmed.
    #[must_use]
    pub fn combined_output(&self) -> String {
        let stdout = self.stdout.trim();
        let stderr = self.stderr.trim();
        match (stdout.is_empty(), stderr.is_empty()) {
            (true, _) => stderr.to_string(),
            (false, true) => stdout.to_string(),
            (false, false) => format!("{stdout}\n{stderr}"),
        }
    }
}

/// Capability to run external programs.
pub trait Executor: Send + Sync + std::fmt::Debug {
    /// Run `program` with `args`, killing it once `timeout` elapses.
    ///
    /// A non-zero exit or a timeout is reported in the returned
    /// [`ExecResult`], not as an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned.
    fn run_with_timeout(&self, program: &str, args: &[&str], timeout: Duration)
    -> Result<ExecResult>;

    /// Check if a program is available on `PATH`.
    fn which(&self, program: &str) -> bool;
}

/// [`Executor`] backed by real processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemExecutor;

impl Executor for SystemExecutor {
    fn run_with_timeout(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<ExecResult> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to execute: {program}"))?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());
        let (code, timed_out) = wait_with_deadline(&mut child, timeout)
            .with_context(|| format!("failed to wait for: {program}"))?;

        let result = ExecResult {
            stdout: stdout.join().unwrap_or_default(),
            stderr: stderr.join().unwrap_or_default(),
            success: !timed_out && code == Some(0),
            code,
            timed_out,
        };
        if timed_out {
            tracing::debug!(program, ?timeout, "command timed out");
        }
        Ok(result)
    }

    fn which(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }
}

/// Read a child pipe to the end on its own thread.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            pipe.read_to_end(&mut buf).ok();
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

/// Poll `child` until it exits or `timeout` elapses; on timeout the child is
/// killed and reaped. Returns the exit code and whether it timed out.
fn wait_with_deadline(child: &mut Child, timeout: Duration) -> std::io::Result<(Option<i32>, bool)> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok((status.code(), false));
        }
        if Instant::now() >= deadline {
            child.kill().ok();
            child.wait()?;
            return Ok((None, true));
        }
        thread::sleep(POLL_INTERVAL);
    }
}
