//! Package-manager tools: tests, builds, installs, and script runs.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use mcp_types::CallToolResult;
use packrun_core::ProjectContext;
use packrun_core::exec::ExecParams;
use packrun_core::exec::execute;
use packrun_core::project::INSTALL_TIMEOUT_MS;
use packrun_core::should_auto_detect_background;
use packrun_core::timeout_for_script;
use packrun_protocol::BackgroundStartResponse;
use packrun_protocol::BuildProjectParams;
use packrun_protocol::ExecResult;
use packrun_protocol::InstallDependenciesParams;
use packrun_protocol::RunScriptParams;
use packrun_protocol::RunTestsParams;
use serde_json::Value;

use super::ToolCallError;
use super::ToolHandler;
use super::ToolResult;
use super::ToolSession;
use super::parse_arguments;

pub(crate) struct ProjectToolHandler;

#[async_trait]
impl ToolHandler for ProjectToolHandler {
    async fn handle(
        &self,
        session: Arc<ToolSession>,
        tool_name: &str,
        arguments: Option<Value>,
    ) -> ToolResult {
        match tool_name {
            "run_tests" => {
                let params: RunTestsParams = parse_arguments(tool_name, arguments)?;
                let context = load_context(&session, params.cwd)?;
                require_script(&context, "test")?;
                let result = run_foreground(&context, "test", &params.args, None).await;
                let headline = match (result.success, context.test_framework) {
                    (true, Some(framework)) => format!("Tests passed ({framework})."),
                    (true, None) => "Tests passed.".to_string(),
                    (false, _) => "Tests failed.".to_string(),
                };
                Ok(render_exec(headline, &result))
            }
            "build_project" => {
                let params: BuildProjectParams = parse_arguments(tool_name, arguments)?;
                let context = load_context(&session, params.cwd)?;
                require_script(&context, "build")?;
                let result = run_foreground(&context, "build", &params.args, None).await;
                let headline = if result.success {
                    "Build succeeded.".to_string()
                } else {
                    "Build failed.".to_string()
                };
                Ok(render_exec(headline, &result))
            }
            "install_dependencies" => {
                let params: InstallDependenciesParams = parse_arguments(tool_name, arguments)?;
                let context = load_context(&session, params.cwd)?;
                let manager = context.package_manager;
                let first_install = !context.dependencies_installed;
                let exec_params = ExecParams {
                    command: manager.command().to_string(),
                    args: manager.install_args(&params.packages, params.dev),
                    cwd: Some(context.root.clone()),
                    timeout_ms: Some(INSTALL_TIMEOUT_MS),
                };
                let result = execute(exec_params).await;
                let headline = if result.success {
                    let what = if params.packages.is_empty() {
                        "dependencies".to_string()
                    } else {
                        params.packages.join(", ")
                    };
                    let note = if first_install && params.packages.is_empty() {
                        " (initial install)"
                    } else {
                        ""
                    };
                    format!("Installed {what} with {}{note}.", manager.command())
                } else {
                    "Dependency installation failed.".to_string()
                };
                Ok(render_exec(headline, &result))
            }
            "run_script" => {
                let params: RunScriptParams = parse_arguments(tool_name, arguments)?;
                let context = load_context(&session, params.cwd.clone())?;
                require_script(&context, &params.script)?;

                // An explicit override always wins; the classifier only
                // decides when the caller left placement unspecified.
                let background = params
                    .background
                    .unwrap_or_else(|| should_auto_detect_background(&params.script));

                if background {
                    let manager = context.package_manager;
                    let response = session
                        .manager
                        .start_background(
                            manager.command(),
                            manager.run_args(&params.script, &params.args),
                            Some(context.root.clone()),
                        )
                        .await;
                    Ok(render_background_start(&response, &context))
                } else {
                    let result =
                        run_foreground(&context, &params.script, &params.args, params.timeout_ms)
                            .await;
                    let headline = if result.success {
                        format!("Script '{}' completed.", params.script)
                    } else {
                        format!("Script '{}' failed.", params.script)
                    };
                    Ok(render_exec(headline, &result))
                }
            }
            other => Err(ToolCallError(format!("unsupported project tool: {other}"))),
        }
    }
}

fn load_context(
    session: &ToolSession,
    cwd: Option<PathBuf>,
) -> Result<ProjectContext, ToolCallError> {
    let root = cwd.unwrap_or_else(|| session.default_root.clone());
    ProjectContext::load(&root).map_err(|err| ToolCallError(err.to_string()))
}

fn require_script(context: &ProjectContext, script: &str) -> Result<(), ToolCallError> {
    if context.has_script(script) {
        return Ok(());
    }
    let names = context.script_names();
    let listing = if names.is_empty() {
        "none".to_string()
    } else {
        names.join(", ")
    };
    Err(ToolCallError(format!(
        "script '{script}' not found in package.json. Available scripts: {listing}"
    )))
}

async fn run_foreground(
    context: &ProjectContext,
    script: &str,
    extra_args: &[String],
    timeout_ms: Option<u64>,
) -> ExecResult {
    let manager = context.package_manager;
    let exec_params = ExecParams {
        command: manager.command().to_string(),
        args: manager.run_args(script, extra_args),
        cwd: Some(context.root.clone()),
        timeout_ms: Some(timeout_ms.unwrap_or_else(|| timeout_for_script(script))),
    };
    execute(exec_params).await
}

fn render_exec(headline: String, result: &ExecResult) -> CallToolResult {
    let mut text = headline;
    if !result.stdout.is_empty() {
        text.push_str("\n\nstdout:\n");
        text.push_str(&result.stdout);
    }
    if !result.stderr.is_empty() {
        text.push_str("\n\nstderr:\n");
        text.push_str(&result.stderr);
    }
    if result.success {
        CallToolResult::text(text)
    } else {
        CallToolResult::error(text)
    }
}

fn render_background_start(
    response: &BackgroundStartResponse,
    context: &ProjectContext,
) -> CallToolResult {
    if !response.success {
        let reason = response.error.as_deref().unwrap_or("unknown error");
        return CallToolResult::error(format!(
            "Failed to start background task {}: {reason}",
            response.task_id
        ));
    }

    let mut text = format!(
        "Started background task {}\n  command: {}\n  cwd: {}\n  status: {}",
        response.task_id,
        response.command_line,
        response.cwd.display(),
        response.status.as_str(),
    );
    if let Some(server) = context.dev_server {
        text.push_str(&format!("\n  dev server: {server}"));
    }
    if response.initial_output.is_empty() {
        text.push_str("\n\nNo output captured yet.");
    } else {
        text.push_str("\n\nInitial output:\n");
        text.push_str(&response.initial_output);
    }
    text.push_str("\n\nUse task_output to read more output and stop_task to stop it.");
    CallToolResult::text(text)
}
