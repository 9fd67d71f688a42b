use std::io::Read;
use std::process::{Command, ExitStatus, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::foundation::error::{MediaError, MediaResult};

const POLL_INTERVAL: Duration = Duration::from_millis(10);
const STDERR_TAIL_BYTES: usize = 4096;

/// Point in time after which a task must give up. `Deadline::none()` never expires.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Deadline {
    at: Option<Instant>,
    limit: Option<Duration>,
}

impl Deadline {
    /// A deadline that never expires.
    pub fn none() -> Self {
        Self {
            at: None,
            limit: None,
        }
    }

    /// Expire `limit` from now.
    pub fn after(limit: Duration) -> Self {
        Self {
            at: Instant::now().checked_add(limit),
            limit: Some(limit),
        }
    }

    /// `after(limit)` when a limit is set, otherwise [`Deadline::none`].
    pub fn from_limit(limit: Option<Duration>) -> Self {
        limit.map_or_else(Self::none, Self::after)
    }

    /// The limit this deadline was created with.
    pub fn limit(self) -> Option<Duration> {
        self.limit
    }

    /// Time left, or `None` when unbounded.
    pub fn remaining(self) -> Option<Duration> {
        self.at
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    /// Whether the deadline has passed.
    pub fn is_expired(self) -> bool {
        self.at.is_some_and(|at| Instant::now() >= at)
    }
}

/// Captured result of a finished subprocess.
#[derive(Debug)]
pub struct ToolOutput {
    /// Exit status.
    pub status: ExitStatus,
    /// Captured standard output.
    pub stdout: Vec<u8>,
    /// Captured standard error.
    pub stderr: Vec<u8>,
}

impl ToolOutput {
    /// Trimmed tail of stderr, suitable for error messages.
    pub fn stderr_tail(&self) -> String {
        stderr_tail(&self.stderr)
    }
}

/// Run `cmd` to completion, killing it if `deadline` passes first.
///
/// stdout and stderr are drained on helper threads so a chatty tool can never block on a full pipe.
/// A non-zero exit status is returned as-is; see [`run_tool`] for the checked variant.
pub fn run_with_deadline(
    cmd: &mut Command,
    tool: &'static str,
    deadline: Deadline,
) -> MediaResult<ToolOutput> {
    let started = Instant::now();
    if deadline.is_expired() {
        return Err(MediaError::TimedOut {
            tool,
            elapsed: Duration::ZERO,
        });
    }

    tracing::debug!(
        tool,
        args = ?cmd.get_args().collect::<Vec<_>>(),
        "spawn"
    );
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    let mut child = cmd
        .spawn()
        .map_err(|source| MediaError::Spawn { tool, source })?;

    let stdout_drain = child.stdout.take().map(drain);
    let stderr_drain = child.stderr.take().map(drain);

    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if deadline.is_expired() {
            // Already-exited races are fine; the wait below reaps either way.
            let _ = child.kill();
            let _ = child.wait();
            let _ = join_drain(stdout_drain);
            let _ = join_drain(stderr_drain);
            tracing::debug!(tool, elapsed = ?started.elapsed(), "killed after deadline");
            return Err(MediaError::TimedOut {
                tool,
                elapsed: started.elapsed(),
            });
        }
        let nap = deadline
            .remaining()
            .map_or(POLL_INTERVAL, |left| left.min(POLL_INTERVAL));
        std::thread::sleep(nap);
    };

    Ok(ToolOutput {
        status,
        stdout: join_drain(stdout_drain)?,
        stderr: join_drain(stderr_drain)?,
    })
}

/// Like [`run_with_deadline`], but a non-zero exit status becomes [`MediaError::Tool`].
pub fn run_tool(
    cmd: &mut Command,
    tool: &'static str,
    deadline: Deadline,
) -> MediaResult<ToolOutput> {
    let out = run_with_deadline(cmd, tool, deadline)?;
    if !out.status.success() {
        return Err(MediaError::Tool {
            tool,
            status: out.status.to_string(),
            stderr: out.stderr_tail(),
        });
    }
    Ok(out)
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<std::io::Result<Vec<u8>>> {
    std::thread::spawn(move || {
        let mut bytes = Vec::new();
        pipe.read_to_end(&mut bytes)?;
        Ok(bytes)
    })
}

fn join_drain(handle: Option<JoinHandle<std::io::Result<Vec<u8>>>>) -> MediaResult<Vec<u8>> {
    match handle {
        Some(h) => h
            .join()
            .map_err(|_| MediaError::Io(std::io::Error::other("pipe drain thread panicked")))?
            .map_err(MediaError::Io),
        None => Ok(Vec::new()),
    }
}

fn stderr_tail(bytes: &[u8]) -> String {
    let start = bytes.len().saturating_sub(STDERR_TAIL_BYTES);
    String::from_utf8_lossy(&bytes[start..]).trim().to_string()
}

#[cfg(test)]
#[path = "../../tests/unit/assets/process.rs"]
mod tests;
