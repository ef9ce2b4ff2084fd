#![cfg(not(target_os = "windows"))]

use packrun_core::error::TaskError;
use packrun_core::task_manager::BackgroundTaskManager;
use packrun_protocol::TaskStatus;

fn args(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| (*item).to_string()).collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn echo_task_acknowledges_with_initial_output() {
    let manager = BackgroundTaskManager::new();
    let response = manager
        .start_background("echo", args(&["ready"]), None)
        .await;
    assert!(response.success);
    assert!(response.task_id.starts_with("echo-"));
    assert!(
        response.initial_output.contains("ready"),
        "initial output: {:?}",
        response.initial_output
    );

    let log = manager
        .read_output(&response.task_id, None)
        .await
        .expect("read output");
    assert!(log.lines.iter().any(|line| line == "ready"));
    // echo exits on its own with code 0
    assert_eq!(log.status, TaskStatus::Stopped);
    assert_eq!(log.exit_code, Some(0));
    assert!(
        log.lines
            .iter()
            .any(|line| line.starts_with("[PROCESS]") && line.contains("code 0"))
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stop_is_graceful_then_already_terminal() {
    let manager = BackgroundTaskManager::new();
    let response = manager
        .start_background("sleep", args(&["30"]), None)
        .await;
    assert!(response.success);
    assert_eq!(response.status, TaskStatus::Running);

    let stopped = manager
        .stop_background(&response.task_id, false)
        .await
        .expect("first stop");
    assert!(!stopped.forced);
    assert_eq!(stopped.task_id, response.task_id);

    let second = manager.stop_background(&response.task_id, false).await;
    assert!(matches!(
        second,
        Err(TaskError::AlreadyTerminal {
            status: TaskStatus::Stopped,
            ..
        })
    ));

    // The stop record is appended exactly once.
    let log = manager
        .read_output(&response.task_id, None)
        .await
        .expect("read output");
    let system_lines = log
        .lines
        .iter()
        .filter(|line| line.starts_with("[SYSTEM]"))
        .count();
    assert_eq!(system_lines, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn force_stop_kills_without_grace() {
    let manager = BackgroundTaskManager::new();
    let response = manager
        .start_background("sleep", args(&["30"]), None)
        .await;
    assert!(response.success);

    let stopped = manager
        .stop_background(&response.task_id, true)
        .await
        .expect("force stop");
    assert!(stopped.forced);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unknown_task_id_is_not_found() {
    let manager = BackgroundTaskManager::new();

    let err = manager
        .stop_background("no-such-task", false)
        .await
        .expect_err("unknown id");
    assert!(matches!(err, TaskError::NotFound { .. }));

    let err = manager
        .read_output("no-such-task", None)
        .await
        .expect_err("unknown id");
    if let TaskError::NotFound { known_ids, .. } = err {
        assert!(known_ids.is_empty());
    } else {
        panic!("unexpected error: {err:?}");
    }

    // Failed lookups never mutate the registry.
    assert!(manager.list_tasks().await.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn spawn_failure_marks_task_failed() {
    let manager = BackgroundTaskManager::new();
    let response = manager
        .start_background("definitely-not-a-real-binary-7f3a", Vec::new(), None)
        .await;
    assert!(!response.success);
    assert_eq!(response.status, TaskStatus::Failed);
    assert!(response.error.is_some());

    // The failed task stays registered for inspection.
    let log = manager
        .read_output(&response.task_id, None)
        .await
        .expect("read output");
    assert_eq!(log.status, TaskStatus::Failed);
    assert!(log.lines.iter().any(|line| line.starts_with("[ERROR]")));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn output_buffer_keeps_the_most_recent_lines() {
    let manager = BackgroundTaskManager::new();
    let response = manager
        .start_background("sh", args(&["-c", "seq 1 150"]), None)
        .await;
    assert!(response.success);

    let log = manager
        .read_output(&response.task_id, Some(100))
        .await
        .expect("read output");
    // 150 numbered lines plus the exit record, trimmed to the newest 100.
    assert_eq!(log.lines.len(), 100);
    assert_eq!(log.total_lines, 100);
    assert_eq!(log.lines.first().map(String::as_str), Some("52"));
    assert!(log.lines.iter().any(|line| line == "150"));
    assert!(
        log.lines
            .last()
            .is_some_and(|line| line.starts_with("[PROCESS]"))
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn read_output_defaults_to_fifty_lines() {
    let manager = BackgroundTaskManager::new();
    let response = manager
        .start_background("sh", args(&["-c", "seq 1 80"]), None)
        .await;
    assert!(response.success);

    let log = manager
        .read_output(&response.task_id, None)
        .await
        .expect("read output");
    assert_eq!(log.lines.len(), 50);
    // The tail is the most recent lines, in arrival order.
    assert_eq!(log.lines.first().map(String::as_str), Some("32"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stderr_lines_carry_the_marker() {
    let manager = BackgroundTaskManager::new();
    let response = manager
        .start_background("sh", args(&["-c", "echo oops 1>&2"]), None)
        .await;
    assert!(response.success);

    let log = manager
        .read_output(&response.task_id, None)
        .await
        .expect("read output");
    assert!(log.lines.iter().any(|line| line == "[STDERR] oops"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn list_orders_newest_first() {
    let manager = BackgroundTaskManager::new();
    let first = manager
        .start_background("sleep", args(&["30"]), None)
        .await;
    let second = manager
        .start_background("sleep", args(&["30"]), None)
        .await;

    let tasks = manager.list_tasks().await;
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0].task_id, second.task_id);
    assert_eq!(tasks[1].task_id, first.task_id);

    for task in [&first, &second] {
        manager
            .stop_background(&task.task_id, true)
            .await
            .expect("cleanup stop");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn shutdown_terminates_running_tasks() {
    let manager = BackgroundTaskManager::new();
    let response = manager
        .start_background("sleep", args(&["30"]), None)
        .await;
    assert!(response.success);

    manager.shutdown_all().await;

    let log = manager
        .read_output(&response.task_id, None)
        .await
        .expect("read output");
    assert_eq!(log.status, TaskStatus::Stopped);
    assert!(
        log.lines
            .iter()
            .any(|line| line.starts_with("[SYSTEM]") && line.contains("shutting down"))
    );
}
