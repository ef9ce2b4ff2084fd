//! Foreground command execution with timeout enforcement.

use std::path::PathBuf;
use std::process::ExitStatus;
use std::process::Stdio;
use std::time::Duration;

use packrun_protocol::ExecResult;
use tokio::io::AsyncReadExt;
use tokio::process::Child;
use tokio::process::Command;
use tokio::time::sleep;

use crate::signal;

pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
pub const MIN_TIMEOUT_MS: u64 = 1_000;
pub const MAX_TIMEOUT_MS: u64 = 300_000;

const READ_CHUNK_SIZE: usize = 8192;
const AGGREGATE_BUFFER_INITIAL_CAPACITY: usize = 8 * 1024;

#[derive(Debug, Clone)]
pub struct ExecParams {
    pub command: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub timeout_ms: Option<u64>,
}

impl ExecParams {
    pub fn new<I, S>(command: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            command: command.into(),
            args: args.into_iter().map(Into::into).collect(),
            cwd: None,
            timeout_ms: None,
        }
    }

    pub fn timeout_duration(&self) -> Duration {
        let millis = self
            .timeout_ms
            .unwrap_or(DEFAULT_TIMEOUT_MS)
            .clamp(MIN_TIMEOUT_MS, MAX_TIMEOUT_MS);
        Duration::from_millis(millis)
    }
}

/// Runs a command to completion or timeout. Never fails with an error value:
/// spawn failures, non-zero exits, and timeouts are all encoded in the
/// returned [`ExecResult`].
pub async fn execute(params: ExecParams) -> ExecResult {
    let timeout = params.timeout_duration();

    let mut cmd = Command::new(&params.command);
    cmd.args(&params.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(cwd) = &params.cwd {
        cmd.current_dir(cwd);
    }

    let child = match cmd.spawn() {
        Ok(child) => child,
        Err(err) => {
            tracing::debug!(command = %params.command, error = %err, "spawn failed");
            return ExecResult {
                stdout: String::new(),
                stderr: err.to_string(),
                success: false,
            };
        }
    };

    consume_output(child, timeout).await
}

/// Drives the child, both pipes, and the timeout concurrently. The single
/// exit path out of the loop is what guarantees the result is produced
/// exactly once, whichever event fires first.
async fn consume_output(mut child: Child, timeout: Duration) -> ExecResult {
    let Some(mut stdout_reader) = child.stdout.take() else {
        return ExecResult {
            stdout: String::new(),
            stderr: "stdout pipe was unexpectedly not available".to_string(),
            success: false,
        };
    };
    let Some(mut stderr_reader) = child.stderr.take() else {
        return ExecResult {
            stdout: String::new(),
            stderr: "stderr pipe was unexpectedly not available".to_string(),
            success: false,
        };
    };

    let mut out_stdout: Vec<u8> = Vec::with_capacity(AGGREGATE_BUFFER_INITIAL_CAPACITY);
    let mut out_stderr: Vec<u8> = Vec::with_capacity(AGGREGATE_BUFFER_INITIAL_CAPACITY);
    let mut tmp_stdout = [0u8; READ_CHUNK_SIZE];
    let mut tmp_stderr = [0u8; READ_CHUNK_SIZE];

    let mut stdout_open = true;
    let mut stderr_open = true;
    let mut child_finished = false;
    let mut timed_out = false;
    let mut exit_status: Option<ExitStatus> = None;
    let mut wait_error: Option<std::io::Error> = None;

    let timeout_fut = sleep(timeout);
    tokio::pin!(timeout_fut);

    while (stdout_open || stderr_open) || !child_finished {
        tokio::select! {
            _ = &mut timeout_fut, if !child_finished => {
                timed_out = true;
                break;
            }

            res = child.wait(), if !child_finished => {
                match res {
                    Ok(status) => exit_status = Some(status),
                    Err(err) => wait_error = Some(err),
                }
                child_finished = true;
            }

            read = stdout_reader.read(&mut tmp_stdout), if stdout_open => {
                match read {
                    Ok(0) | Err(_) => stdout_open = false,
                    Ok(n) => out_stdout.extend_from_slice(&tmp_stdout[..n]),
                }
            }

            read = stderr_reader.read(&mut tmp_stderr), if stderr_open => {
                match read {
                    Ok(0) | Err(_) => stderr_open = false,
                    Ok(n) => out_stderr.extend_from_slice(&tmp_stderr[..n]),
                }
            }
        }
    }

    if timed_out {
        // Graceful signal now, forced kill after the grace window; the
        // caller gets its result immediately.
        terminate_with_grace(child);
    }

    let stdout = String::from_utf8_lossy(&out_stdout).trim().to_string();
    let mut stderr = String::from_utf8_lossy(&out_stderr).trim().to_string();

    if timed_out {
        if !stderr.is_empty() {
            stderr.push('\n');
        }
        stderr.push_str(&format!(
            "Command timed out after {} ms",
            timeout.as_millis()
        ));
    }
    if let Some(err) = &wait_error {
        if !stderr.is_empty() {
            stderr.push('\n');
        }
        stderr.push_str(&format!("Failed to wait for process: {err}"));
    }

    let success = !timed_out
        && wait_error.is_none()
        && exit_status.is_some_and(|status| status.code() == Some(0));

    ExecResult {
        stdout,
        stderr,
        success,
    }
}

fn terminate_with_grace(mut child: Child) {
    #[cfg(unix)]
    if let Some(pid) = child.id()
        && let Err(err) = signal::send_sigterm(pid)
    {
        tracing::debug!(pid, error = %err, "SIGTERM delivery failed");
    }
    #[cfg(not(unix))]
    {
        let _ = child.start_kill();
    }

    tokio::spawn(async move {
        tokio::select! {
            _ = child.wait() => {}
            _ = sleep(signal::KILL_GRACE) => {
                let _ = child.start_kill();
                let _ = child.wait().await;
            }
        }
    });
}
