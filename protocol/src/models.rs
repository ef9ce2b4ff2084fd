use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

/// Lifecycle state of a supervised background task.
///
/// `Running` is the initial state; `Stopped` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Running,
    Stopped,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, TaskStatus::Running)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Running => "running",
            TaskStatus::Stopped => "stopped",
            TaskStatus::Failed => "failed",
        }
    }
}

/// Outcome of one foreground command invocation. All failure modes are
/// encoded here; `execute` never returns an error value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecResult {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
}

/// Startup acknowledgment returned by `start_background`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackgroundStartResponse {
    pub task_id: String,
    pub status: TaskStatus,
    pub cwd: PathBuf,
    pub command_line: String,
    pub initial_output: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One entry of `list_tasks`, newest-started first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSummary {
    pub task_id: String,
    pub command_line: String,
    pub cwd: PathBuf,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    pub started_at_ms: u64,
    pub runtime_secs: u64,
    pub tail_lines: Vec<String>,
}

/// Tail view of a task's output buffer plus task metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskLogView {
    pub task_id: String,
    pub command_line: String,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    pub lines: Vec<String>,
    pub total_lines: usize,
}

/// Result of a stop request that reached a running task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopResponse {
    pub task_id: String,
    pub command_line: String,
    pub runtime_secs: u64,
    pub forced: bool,
}

/// Arguments for the `run_script` tool.
#[derive(Debug, Clone, Deserialize)]
pub struct RunScriptParams {
    pub script: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub cwd: Option<PathBuf>,
    /// Explicit override: bypasses the background classifier entirely.
    #[serde(default)]
    pub background: Option<bool>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

/// Arguments for the `run_tests` tool.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunTestsParams {
    #[serde(default)]
    pub cwd: Option<PathBuf>,
    #[serde(default)]
    pub args: Vec<String>,
}

/// Arguments for the `build_project` tool.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BuildProjectParams {
    #[serde(default)]
    pub cwd: Option<PathBuf>,
    #[serde(default)]
    pub args: Vec<String>,
}

/// Arguments for the `install_dependencies` tool.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InstallDependenciesParams {
    #[serde(default)]
    pub cwd: Option<PathBuf>,
    #[serde(default)]
    pub packages: Vec<String>,
    #[serde(default)]
    pub dev: bool,
}

/// Arguments for the `task_output` tool.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskOutputParams {
    pub task_id: String,
    #[serde(default)]
    pub lines: Option<usize>,
}

/// Arguments for the `stop_task` tool.
#[derive(Debug, Clone, Deserialize)]
pub struct StopTaskParams {
    pub task_id: String,
    #[serde(default)]
    pub force: bool,
}
