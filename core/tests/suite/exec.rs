#![cfg(not(target_os = "windows"))]

use std::time::Duration;
use std::time::Instant;

use packrun_core::exec::ExecParams;
use packrun_core::exec::execute;

#[tokio::test]
async fn echo_succeeds_and_captures_stdout() {
    let result = execute(ExecParams::new("echo", ["hello world"])).await;
    assert!(result.success);
    assert_eq!(result.stdout, "hello world");
    assert_eq!(result.stderr, "");
}

#[tokio::test]
async fn nonzero_exit_reports_failure() {
    let result = execute(ExecParams::new("false", Vec::<String>::new())).await;
    assert!(!result.success);
}

#[tokio::test]
async fn stderr_is_captured_separately() {
    let result = execute(ExecParams::new("sh", ["-c", "echo out; echo err 1>&2"])).await;
    assert!(result.success);
    assert_eq!(result.stdout, "out");
    assert_eq!(result.stderr, "err");
}

#[tokio::test]
async fn missing_executable_fails_immediately() {
    let start = Instant::now();
    let result = execute(ExecParams::new(
        "definitely-not-a-real-binary-7f3a",
        Vec::<String>::new(),
    ))
    .await;
    assert!(!result.success);
    assert!(result.stdout.is_empty());
    assert!(!result.stderr.is_empty());
    assert!(start.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn timeout_resolves_immediately_with_notice() {
    let start = Instant::now();
    let mut params = ExecParams::new("sleep", ["5"]);
    params.timeout_ms = Some(1_000);
    let result = execute(params).await;
    assert!(!result.success);
    assert!(result.stderr.contains("timed out"), "stderr: {}", result.stderr);
    assert!(
        start.elapsed() < Duration::from_millis(2_500),
        "took {:?}",
        start.elapsed()
    );
}

#[tokio::test]
async fn output_before_timeout_is_retained() {
    let mut params = ExecParams::new("sh", ["-c", "echo early; sleep 5"]);
    params.timeout_ms = Some(1_000);
    let result = execute(params).await;
    assert!(!result.success);
    assert_eq!(result.stdout, "early");
}

#[tokio::test]
async fn cwd_is_respected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let canonical = dir.path().canonicalize().expect("canonicalize");
    let mut params = ExecParams::new("pwd", Vec::<String>::new());
    params.cwd = Some(dir.path().to_path_buf());
    let result = execute(params).await;
    assert!(result.success);
    assert_eq!(result.stdout, canonical.display().to_string());
}
