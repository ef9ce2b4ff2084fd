//! Background task inspection and termination tools.

use std::sync::Arc;

use async_trait::async_trait;
use mcp_types::CallToolResult;
use packrun_core::TaskError;
use packrun_protocol::StopTaskParams;
use packrun_protocol::TaskLogView;
use packrun_protocol::TaskOutputParams;
use packrun_protocol::TaskSummary;
use serde_json::Value;

use super::ToolCallError;
use super::ToolHandler;
use super::ToolResult;
use super::ToolSession;
use super::parse_arguments;

pub(crate) struct TaskToolHandler;

#[async_trait]
impl ToolHandler for TaskToolHandler {
    async fn handle(
        &self,
        session: Arc<ToolSession>,
        tool_name: &str,
        arguments: Option<Value>,
    ) -> ToolResult {
        match tool_name {
            "list_tasks" => {
                let tasks = session.manager.list_tasks().await;
                Ok(CallToolResult::text(render_task_list(&tasks)))
            }
            "task_output" => {
                let params: TaskOutputParams = parse_arguments(tool_name, arguments)?;
                let view = session
                    .manager
                    .read_output(&params.task_id, params.lines)
                    .await
                    .map_err(|err| ToolCallError(task_error_message(err)))?;
                Ok(CallToolResult::text(render_log_view(&view)))
            }
            "stop_task" => {
                let params: StopTaskParams = parse_arguments(tool_name, arguments)?;
                match session
                    .manager
                    .stop_background(&params.task_id, params.force)
                    .await
                {
                    Ok(response) => {
                        let how = if response.forced {
                            "killed"
                        } else {
                            "stopped gracefully"
                        };
                        Ok(CallToolResult::text(format!(
                            "Task {} ({}) {how} after {}s.",
                            response.task_id, response.command_line, response.runtime_secs
                        )))
                    }
                    // Informational, not a failure: the task had already
                    // reached a terminal state.
                    Err(TaskError::AlreadyTerminal { task_id, status }) => {
                        Ok(CallToolResult::text(format!(
                            "Task {task_id} is not running (status: {}). No action taken.",
                            status.as_str()
                        )))
                    }
                    Err(err) => Err(ToolCallError(task_error_message(err))),
                }
            }
            other => Err(ToolCallError(format!("unsupported task tool: {other}"))),
        }
    }
}

fn task_error_message(err: TaskError) -> String {
    match err {
        TaskError::NotFound { task_id, known_ids } => {
            if known_ids.is_empty() {
                format!("unknown task id: {task_id}. No background tasks are registered.")
            } else {
                format!(
                    "unknown task id: {task_id}. Known tasks: {}",
                    known_ids.join(", ")
                )
            }
        }
        TaskError::Termination { task_id, message } => {
            format!(
                "failed to terminate task {task_id}: {message}. Retry with force=true to kill \
                 it outright."
            )
        }
        other => other.to_string(),
    }
}

fn render_task_list(tasks: &[TaskSummary]) -> String {
    if tasks.is_empty() {
        return "No background tasks.".to_string();
    }
    let mut text = format!("{} background task(s), newest first:", tasks.len());
    for task in tasks {
        text.push_str(&format!(
            "\n- {} [{}] `{}` ({}runtime {}s)",
            task.task_id,
            task.status.as_str(),
            task.command_line,
            task.pid
                .map(|pid| format!("pid {pid}, "))
                .unwrap_or_default(),
            task.runtime_secs,
        ));
        if let Some(last) = task.tail_lines.last() {
            text.push_str(&format!("\n    last output: {last}"));
        }
    }
    text
}

fn render_log_view(view: &TaskLogView) -> String {
    let exit = view
        .exit_code
        .map(|code| format!(", exit code {code}"))
        .unwrap_or_default();
    let mut text = format!(
        "Output for {} [{}{exit}] `{}` — {} of {} buffered line(s):",
        view.task_id,
        view.status.as_str(),
        view.command_line,
        view.lines.len(),
        view.total_lines,
    );
    if view.lines.is_empty() {
        text.push_str("\n(no output captured)");
    } else {
        for line in &view.lines {
            text.push('\n');
            text.push_str(line);
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use packrun_protocol::TaskStatus;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn empty_task_list_renders_placeholder() {
        assert_eq!(render_task_list(&[]), "No background tasks.");
    }

    #[test]
    fn task_list_includes_status_and_tail() {
        let tasks = vec![TaskSummary {
            task_id: "npm-1700000000000-00c0ffee".to_string(),
            command_line: "npm run dev".to_string(),
            cwd: PathBuf::from("/work/app"),
            status: TaskStatus::Running,
            pid: Some(4242),
            exit_code: None,
            started_at_ms: 1_700_000_000_000,
            runtime_secs: 12,
            tail_lines: vec!["ready on :3000".to_string()],
        }];
        let rendered = render_task_list(&tasks);
        assert!(rendered.contains("npm-1700000000000-00c0ffee [running] `npm run dev`"));
        assert!(rendered.contains("pid 4242"));
        assert!(rendered.contains("last output: ready on :3000"));
    }

    #[test]
    fn log_view_shows_counts_and_exit_code() {
        let view = TaskLogView {
            task_id: "npm-1-aa".to_string(),
            command_line: "npm run build".to_string(),
            status: TaskStatus::Failed,
            exit_code: Some(2),
            lines: vec!["[PROCESS] Process exited with code 2".to_string()],
            total_lines: 1,
        };
        let rendered = render_log_view(&view);
        assert!(rendered.contains("[failed, exit code 2]"));
        assert!(rendered.contains("1 of 1 buffered line(s)"));
    }

    #[test]
    fn not_found_message_lists_known_ids() {
        let message = task_error_message(TaskError::NotFound {
            task_id: "nope".to_string(),
            known_ids: vec!["npm-1-aa".to_string(), "npm-2-bb".to_string()],
        });
        assert_eq!(
            message,
            "unknown task id: nope. Known tasks: npm-1-aa, npm-2-bb"
        );
    }
}
