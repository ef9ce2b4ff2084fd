//! Supervised background tasks: detached spawning, bounded rolling output,
//! lifecycle tracking, and graceful-then-forced termination.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use packrun_protocol::BackgroundStartResponse;
use packrun_protocol::StopResponse;
use packrun_protocol::TaskLogView;
use packrun_protocol::TaskStatus;
use packrun_protocol::TaskSummary;
use tokio::io::AsyncReadExt;
use tokio::process::Child;
use tokio::process::Command;
use tokio::sync::Mutex;
use tokio::time::Duration;
use tokio::time::sleep;

use crate::command_label::command_line_for_display;
use crate::error::TaskError;
use crate::signal;

/// Rolling output window per task; oldest lines are discarded beyond this.
pub const OUTPUT_CAP_LINES: usize = 100;
pub const DEFAULT_READ_LINES: usize = 50;
/// Lines of tail preview included in task summaries.
const SUMMARY_TAIL_LINES: usize = 10;
/// How long `start_background` waits before acknowledging, giving dev
/// servers time to print a ready banner while bounding the caller's wait.
const STARTUP_ACK_WINDOW: Duration = Duration::from_millis(3_000);
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(200);
const READ_CHUNK_SIZE: usize = 4096;

const STDERR_MARKER: &str = "[STDERR]";
const PROCESS_MARKER: &str = "[PROCESS]";
const SYSTEM_MARKER: &str = "[SYSTEM]";
const ERROR_MARKER: &str = "[ERROR]";

/// Single source of truth for all detached processes. Constructed once per
/// server lifetime and shared by `Arc`; entries are registered on start and
/// never removed, so output stays inspectable after termination.
#[derive(Default)]
pub struct BackgroundTaskManager {
    inner: Arc<Mutex<TaskRegistry>>,
}

#[derive(Default)]
struct TaskRegistry {
    entries: HashMap<String, SharedEntry>,
    next_seq: u64,
}

type SharedEntry = Arc<Mutex<TaskEntry>>;

struct TaskEntry {
    id: String,
    command: String,
    args: Vec<String>,
    cwd: PathBuf,
    seq: u64,
    pid: Option<u32>,
    status: TaskStatus,
    exit_code: Option<i32>,
    started_at: SystemTime,
    completed_at: Option<SystemTime>,
    output: VecDeque<String>,
    initial_output: Option<String>,
    /// Exclusively-owned process handle; signalled only through manager
    /// operations, never exposed to callers.
    child: Option<Arc<Mutex<Child>>>,
}

impl TaskEntry {
    fn new(id: String, command: String, args: Vec<String>, cwd: PathBuf, seq: u64) -> Self {
        Self {
            id,
            command,
            args,
            cwd,
            seq,
            pid: None,
            status: TaskStatus::Running,
            exit_code: None,
            started_at: SystemTime::now(),
            completed_at: None,
            output: VecDeque::new(),
            initial_output: None,
            child: None,
        }
    }

    fn command_line(&self) -> String {
        command_line_for_display(&self.command, &self.args)
    }

    fn runtime_secs(&self) -> u64 {
        let end = self.completed_at.unwrap_or_else(SystemTime::now);
        end.duration_since(self.started_at)
            .unwrap_or_default()
            .as_secs()
    }

    fn push_line(&mut self, line: String) {
        self.output.push_back(line);
        while self.output.len() > OUTPUT_CAP_LINES {
            self.output.pop_front();
        }
    }

    fn append_chunk(&mut self, chunk: &str, is_stderr: bool) {
        for line in chunk.lines() {
            let text = line.trim_end_matches('\r');
            if text.is_empty() {
                continue;
            }
            if is_stderr {
                self.push_line(format!("{STDERR_MARKER} {text}"));
            } else {
                self.push_line(text.to_string());
            }
        }
    }

    fn mark_terminal(&mut self, status: TaskStatus) {
        self.status = status;
        if self.completed_at.is_none() {
            self.completed_at = Some(SystemTime::now());
        }
    }

    fn to_summary(&self) -> TaskSummary {
        let tail_start = self.output.len().saturating_sub(SUMMARY_TAIL_LINES);
        TaskSummary {
            task_id: self.id.clone(),
            command_line: self.command_line(),
            cwd: self.cwd.clone(),
            status: self.status,
            pid: self.pid,
            exit_code: self.exit_code,
            started_at_ms: system_time_to_epoch_ms(self.started_at),
            runtime_secs: self.runtime_secs(),
            tail_lines: self.output.iter().skip(tail_start).cloned().collect(),
        }
    }
}

impl BackgroundTaskManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns a detached process and registers it. The call resolves a fixed
    /// window after spawn with whatever initial output has arrived; the task
    /// keeps running and emitting output after the caller resumes.
    pub async fn start_background(
        &self,
        command: &str,
        args: Vec<String>,
        cwd: Option<PathBuf>,
    ) -> BackgroundStartResponse {
        let cwd = cwd
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));
        let task_id = allocate_task_id(command);
        let command_line = command_line_for_display(command, &args);

        // Register in `running` state before any output can arrive.
        let entry = {
            let mut registry = self.inner.lock().await;
            registry.next_seq += 1;
            let entry = Arc::new(Mutex::new(TaskEntry::new(
                task_id.clone(),
                command.to_string(),
                args.clone(),
                cwd.clone(),
                registry.next_seq,
            )));
            registry.entries.insert(task_id.clone(), Arc::clone(&entry));
            entry
        };

        let mut cmd = Command::new(command);
        cmd.args(&args)
            .current_dir(&cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(err) => {
                // Spawn errors are synchronous, so this path always settles
                // before the acknowledgment window could.
                let mut guard = entry.lock().await;
                guard.mark_terminal(TaskStatus::Failed);
                guard.push_line(format!("{ERROR_MARKER} Failed to spawn: {err}"));
                tracing::warn!(task_id = %task_id, error = %err, "background task failed to spawn");
                return BackgroundStartResponse {
                    task_id,
                    status: TaskStatus::Failed,
                    cwd,
                    command_line,
                    initial_output: String::new(),
                    success: false,
                    error: Some(err.to_string()),
                };
            }
        };

        let pid = child.id();
        if let Some(stdout) = child.stdout.take() {
            spawn_chunk_reader(Arc::clone(&entry), stdout, false);
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_chunk_reader(Arc::clone(&entry), stderr, true);
        }

        let shared_child = Arc::new(Mutex::new(child));
        {
            let mut guard = entry.lock().await;
            guard.pid = pid;
            guard.child = Some(Arc::clone(&shared_child));
        }
        spawn_monitor(Arc::clone(&entry), shared_child);
        tracing::info!(task_id = %task_id, pid = ?pid, command = %command_line, "background task started");

        sleep(STARTUP_ACK_WINDOW).await;

        let guard = entry.lock().await;
        BackgroundStartResponse {
            task_id,
            status: guard.status,
            cwd,
            command_line,
            initial_output: guard
                .initial_output
                .as_deref()
                .unwrap_or_default()
                .trim()
                .to_string(),
            success: true,
            error: None,
        }
    }

    /// Stops a running task: graceful termination with forced-kill
    /// escalation after the grace window, or an immediate forced kill.
    pub async fn stop_background(
        &self,
        task_id: &str,
        force: bool,
    ) -> Result<StopResponse, TaskError> {
        let entry = self.find_entry(task_id).await?;

        let (child, pid, id, command_line, runtime_secs) = {
            let guard = entry.lock().await;
            if guard.status.is_terminal() {
                return Err(TaskError::AlreadyTerminal {
                    task_id: guard.id.clone(),
                    status: guard.status,
                });
            }
            (
                guard.child.clone(),
                guard.pid,
                guard.id.clone(),
                guard.command_line(),
                guard.runtime_secs(),
            )
        };

        if force {
            let Some(child) = &child else {
                return Err(TaskError::Termination {
                    task_id: id,
                    message: "no process handle".to_string(),
                });
            };
            let mut child_guard = child.lock().await;
            match child_guard.start_kill() {
                Ok(()) => {}
                // Already reaped; nothing left to kill.
                Err(err) if err.kind() == std::io::ErrorKind::InvalidInput => {}
                Err(err) => {
                    return Err(TaskError::Termination {
                        task_id: id,
                        message: err.to_string(),
                    });
                }
            }
        } else {
            let Some(pid) = pid else {
                return Err(TaskError::Termination {
                    task_id: id,
                    message: "process already gone".to_string(),
                });
            };
            signal::send_sigterm(pid).map_err(|err| TaskError::Termination {
                task_id: id.clone(),
                message: err.to_string(),
            })?;
            if let Some(child) = child {
                spawn_kill_escalation(child);
            }
        }

        let mut guard = entry.lock().await;
        guard.mark_terminal(TaskStatus::Stopped);
        guard.push_line(format!("{SYSTEM_MARKER} Task stopped after {runtime_secs}s"));
        tracing::info!(task_id = %id, forced = force, "background task stopped");

        Ok(StopResponse {
            task_id: id,
            command_line,
            runtime_secs,
            forced: force,
        })
    }

    /// Tail of the task's output buffer, at most `min(max_lines, 100)` lines
    /// (default 50), plus task metadata.
    pub async fn read_output(
        &self,
        task_id: &str,
        max_lines: Option<usize>,
    ) -> Result<TaskLogView, TaskError> {
        let entry = self.find_entry(task_id).await?;
        let limit = max_lines.unwrap_or(DEFAULT_READ_LINES).min(OUTPUT_CAP_LINES);

        let guard = entry.lock().await;
        let total_lines = guard.output.len();
        let tail_start = total_lines.saturating_sub(limit);
        Ok(TaskLogView {
            task_id: guard.id.clone(),
            command_line: guard.command_line(),
            status: guard.status,
            exit_code: guard.exit_code,
            lines: guard.output.iter().skip(tail_start).cloned().collect(),
            total_lines,
        })
    }

    /// All registered tasks, newest-started first. Never fails.
    pub async fn list_tasks(&self) -> Vec<TaskSummary> {
        let entries: Vec<SharedEntry> = {
            let registry = self.inner.lock().await;
            registry.entries.values().cloned().collect()
        };

        let mut summaries = Vec::with_capacity(entries.len());
        for entry in entries {
            let guard = entry.lock().await;
            summaries.push((guard.seq, guard.to_summary()));
        }
        summaries.sort_by_key(|(seq, _)| std::cmp::Reverse(*seq));
        summaries.into_iter().map(|(_, summary)| summary).collect()
    }

    /// Best-effort shutdown: graceful signal to every still-running task.
    /// No forced escalation is scheduled; the host process is exiting.
    pub async fn shutdown_all(&self) {
        let entries: Vec<SharedEntry> = {
            let registry = self.inner.lock().await;
            registry.entries.values().cloned().collect()
        };

        let mut stopped = 0usize;
        for entry in entries {
            let mut guard = entry.lock().await;
            if guard.status != TaskStatus::Running {
                continue;
            }
            if let Some(pid) = guard.pid
                && let Err(err) = signal::send_sigterm(pid)
            {
                tracing::debug!(pid, error = %err, "shutdown signal failed");
            }
            guard.mark_terminal(TaskStatus::Stopped);
            guard.push_line(format!("{SYSTEM_MARKER} Server shutting down, task terminated"));
            stopped += 1;
        }
        if stopped > 0 {
            tracing::info!(stopped, "terminated background tasks on shutdown");
        }
    }

    async fn find_entry(&self, task_id: &str) -> Result<SharedEntry, TaskError> {
        let registry = self.inner.lock().await;
        if let Some(entry) = registry.entries.get(task_id) {
            return Ok(Arc::clone(entry));
        }
        let known_ids = registry.entries.keys().cloned().collect();
        Err(TaskError::NotFound {
            task_id: task_id.to_string(),
            known_ids,
        })
    }
}

/// Unique id: command name + creation timestamp + random suffix. Not
/// cryptographic; the timestamp+random pair is what keeps concurrent
/// registrations apart.
fn allocate_task_id(command: &str) -> String {
    let timestamp_ms = system_time_to_epoch_ms(SystemTime::now());
    let suffix: u32 = rand::random();
    format!("{command}-{timestamp_ms}-{suffix:08x}")
}

fn system_time_to_epoch_ms(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis() as u64)
        .unwrap_or(0)
}

fn spawn_chunk_reader<R>(entry: SharedEntry, mut reader: R, is_stderr: bool)
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = vec![0u8; READ_CHUNK_SIZE];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    let chunk = String::from_utf8_lossy(&buf[..n]).into_owned();
                    let mut guard = entry.lock().await;
                    if guard.initial_output.is_none() {
                        guard.initial_output = Some(chunk.clone());
                    }
                    guard.append_chunk(&chunk, is_stderr);
                }
            }
        }
    });
}

fn spawn_monitor(entry: SharedEntry, child: Arc<Mutex<Child>>) {
    tokio::spawn(async move {
        loop {
            let waited = { child.lock().await.try_wait() };
            match waited {
                Ok(Some(status)) => {
                    let mut guard = entry.lock().await;
                    let code = status.code();
                    if guard.status == TaskStatus::Running {
                        guard.exit_code = code;
                        guard.mark_terminal(if code == Some(0) {
                            TaskStatus::Stopped
                        } else {
                            TaskStatus::Failed
                        });
                        let line = match code {
                            Some(code) => {
                                format!("{PROCESS_MARKER} Process exited with code {code}")
                            }
                            None => format!("{PROCESS_MARKER} Process terminated by signal"),
                        };
                        guard.push_line(line);
                    } else if guard.exit_code.is_none() {
                        guard.exit_code = code;
                    }
                    break;
                }
                Ok(None) => {}
                Err(err) => {
                    let mut guard = entry.lock().await;
                    if guard.status == TaskStatus::Running {
                        guard.mark_terminal(TaskStatus::Failed);
                        guard.push_line(format!("{ERROR_MARKER} Failed to monitor process: {err}"));
                    }
                    break;
                }
            }
            sleep(WAIT_POLL_INTERVAL).await;
        }
    });
}

/// Forced kill after the grace window if the graceful signal did not land.
fn spawn_kill_escalation(child: Arc<Mutex<Child>>) {
    tokio::spawn(async move {
        sleep(signal::KILL_GRACE).await;
        let mut guard = child.lock().await;
        if let Ok(None) = guard.try_wait() {
            let _ = guard.start_kill();
        }
    });
}
